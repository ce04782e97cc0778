//! The closed enumeration of record quality assertions.
//!
//! Each assertion is a boolean check on a record: `qaStatus = 0` means the
//! check failed (a problem was detected), `1` means it passed. Codes are
//! partitioned by category; `Missing` checks report absent fields rather
//! than bad values.

use std::collections::HashSet;

/// Category of a quality assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionCategory {
    Error,
    Missing,
    Warning,
    Verified,
}

/// One assertion in the closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionCode {
    pub code: i32,
    pub name: &'static str,
    pub category: AssertionCategory,
}

/// Codes excluded from the unchecked computation.
pub const PROCESSING_ERROR: i32 = 500;
pub const VERIFIED: i32 = 1000;

use AssertionCategory::*;

static ALL_CODES: &[AssertionCode] = &[
    AssertionCode { code: 1, name: "NEGATED_LATITUDE", category: Warning },
    AssertionCode { code: 2, name: "NEGATED_LONGITUDE", category: Warning },
    AssertionCode { code: 3, name: "INVERTED_COORDINATES", category: Warning },
    AssertionCode { code: 4, name: "ZERO_COORDINATES", category: Error },
    AssertionCode { code: 5, name: "COORDINATES_OUT_OF_RANGE", category: Error },
    AssertionCode { code: 6, name: "UNKNOWN_COUNTRY_NAME", category: Error },
    AssertionCode { code: 7, name: "COORDINATE_HABITAT_MISMATCH", category: Error },
    AssertionCode { code: 8, name: "STATE_COORDINATE_MISMATCH", category: Warning },
    AssertionCode { code: 9, name: "COUNTRY_COORDINATE_MISMATCH", category: Warning },
    AssertionCode { code: 19, name: "MISSING_BASIS_OF_RECORD", category: Missing },
    AssertionCode { code: 20, name: "BADLY_FORMED_BASIS_OF_RECORD", category: Error },
    AssertionCode { code: 24, name: "UNRECOGNISED_COLLECTION_CODE", category: Warning },
    AssertionCode { code: 25, name: "UNRECOGNISED_INSTITUTION_CODE", category: Warning },
    AssertionCode { code: 27, name: "UNCERTAINTY_RANGE_MISMATCH", category: Warning },
    AssertionCode { code: 28, name: "UNCERTAINTY_IN_PRECISION", category: Warning },
    AssertionCode { code: 30, name: "FIRST_OF_MONTH", category: Warning },
    AssertionCode { code: 31, name: "FIRST_OF_YEAR", category: Warning },
    AssertionCode { code: 32, name: "FIRST_OF_CENTURY", category: Warning },
    AssertionCode { code: 33, name: "INVALID_COLLECTION_DATE", category: Error },
    AssertionCode { code: 34, name: "MISSING_COLLECTION_DATE", category: Missing },
    AssertionCode { code: 35, name: "DAY_MONTH_TRANSPOSED", category: Warning },
    AssertionCode { code: 50, name: "NAME_NOT_RECOGNISED", category: Error },
    AssertionCode { code: 51, name: "NAME_NOT_IN_NATIONAL_CHECKLISTS", category: Warning },
    AssertionCode { code: 52, name: "HOMONYM_ISSUE", category: Warning },
    AssertionCode { code: 53, name: "UNRECOGNISED_TAXON_RANK", category: Warning },
    AssertionCode { code: 101, name: "MISSING_GEODETIC_DATUM", category: Missing },
    AssertionCode { code: 102, name: "MISSING_GEOREFERENCED_BY", category: Missing },
    AssertionCode { code: 103, name: "MISSING_GEOREFERENCE_PROTOCOL", category: Missing },
    AssertionCode { code: 104, name: "MISSING_GEOREFERENCE_SOURCES", category: Missing },
    AssertionCode { code: 105, name: "MISSING_GEOREFERENCE_VERIFICATION_STATUS", category: Missing },
    AssertionCode { code: 106, name: "MISSING_GEOREFERENCE_DATE", category: Missing },
    AssertionCode { code: PROCESSING_ERROR, name: "PROCESSING_ERROR", category: Error },
    AssertionCode { code: VERIFIED, name: "VERIFIED", category: Verified },
];

/// Lookup over the closed enumeration.
pub struct AssertionCodes;

impl AssertionCodes {
    /// Every code in the enumeration, in code order.
    pub fn all() -> &'static [AssertionCode] {
        ALL_CODES
    }

    pub fn get_by_code(code: i32) -> Option<&'static AssertionCode> {
        ALL_CODES.iter().find(|c| c.code == code)
    }

    pub fn get_by_name(name: &str) -> Option<&'static AssertionCode> {
        ALL_CODES.iter().find(|c| c.name == name)
    }

    /// Codes not present in `seen`, excluding `PROCESSING_ERROR` and
    /// `VERIFIED`; the engine emits these as unchecked assertions.
    pub fn unchecked_codes(seen: &HashSet<i32>) -> Vec<&'static AssertionCode> {
        ALL_CODES
            .iter()
            .filter(|c| c.code != PROCESSING_ERROR && c.code != VERIFIED)
            .filter(|c| !seen.contains(&c.code))
            .collect()
    }
}
