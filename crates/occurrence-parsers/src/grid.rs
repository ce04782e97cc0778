//! OS-style grid-reference helpers for the feature-flagged grid fields.

/// Split a `minLat,minLng,maxLat,maxLng` bounding box string.
pub fn parse_bbox(s: &str) -> Option<(f64, f64, f64, f64)> {
    let mut parts = s.split(',').map(str::trim);
    let min_lat = parts.next()?.parse().ok()?;
    let min_lng = parts.next()?.parse().ok()?;
    let max_lat = parts.next()?.parse().ok()?;
    let max_lng = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((min_lat, min_lng, max_lat, max_lng))
}

/// Expand a grid reference into the coarser references it falls inside,
/// one per supported resolution.
///
/// A reference is a 1-2 letter square prefix followed by an even number of
/// digits (half easting, half northing). `NM3941` lies in the 10 km square
/// `NM34` and the 100 km square `NM`, yielding
/// `grid_ref_100000 = NM`, `grid_ref_10000 = NM34`, `grid_ref_1000 = NM3941`.
pub fn grid_ref_as_resolutions(grid_ref: &str) -> Vec<(String, String)> {
    let normalized: String = grid_ref
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let letters: String = normalized.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits: String = normalized.chars().skip(letters.len()).collect();

    if letters.is_empty()
        || letters.len() > 2
        || digits.len() % 2 != 0
        || digits.len() > 8
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return Vec::new();
    }

    let half = digits.len() / 2;
    let (easting_digits, northing_digits) = digits.split_at(half);

    let mut out = vec![("grid_ref_100000".to_string(), letters.clone())];
    for precision in 1..=half {
        let resolution = 100_000 / 10_usize.pow(precision as u32);
        let value = format!(
            "{}{}{}",
            letters,
            &easting_digits[..precision],
            &northing_digits[..precision]
        );
        out.push((format!("grid_ref_{resolution}"), value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bbox() {
        assert_eq!(
            parse_bbox("-35.1,149.0,-35.0,149.2"),
            Some((-35.1, 149.0, -35.0, 149.2))
        );
        assert_eq!(parse_bbox("-35.1,149.0,-35.0"), None);
        assert_eq!(parse_bbox("a,b,c,d"), None);
    }

    #[test]
    fn test_grid_ref_resolutions() {
        let res = grid_ref_as_resolutions("NM3941");
        assert_eq!(
            res,
            vec![
                ("grid_ref_100000".to_string(), "NM".to_string()),
                ("grid_ref_10000".to_string(), "NM34".to_string()),
                ("grid_ref_1000".to_string(), "NM3941".to_string()),
            ]
        );
    }

    #[test]
    fn test_grid_ref_letters_only() {
        let res = grid_ref_as_resolutions("NM");
        assert_eq!(res, vec![("grid_ref_100000".to_string(), "NM".to_string())]);
    }

    #[test]
    fn test_grid_ref_irish_single_letter() {
        let res = grid_ref_as_resolutions("N12");
        assert_eq!(
            res,
            vec![
                ("grid_ref_100000".to_string(), "N".to_string()),
                ("grid_ref_10000".to_string(), "N12".to_string()),
            ]
        );
    }

    #[test]
    fn test_grid_ref_rejects_junk() {
        assert!(grid_ref_as_resolutions("123").is_empty());
        assert!(grid_ref_as_resolutions("NM123").is_empty());
        assert!(grid_ref_as_resolutions("").is_empty());
    }

    #[test]
    fn test_grid_ref_normalizes_case_and_spaces() {
        let res = grid_ref_as_resolutions("nm 39 41");
        assert_eq!(res[2].1, "NM3941");
    }
}
