//! Column schema for the observation table.
//!
//! Factor level sets are closed and explicitly ordered here. Level order
//! drives the contrast coding, so it is declared once and never inferred
//! from the sort order of observed data.

/// A categorical column with a fixed, closed label set.
#[derive(Debug, Clone)]
pub struct FactorSpec {
    pub column: &'static str,
    pub levels: &'static [&'static str],
    /// Ordinal factors (e.g. political orientation) keep their label order
    /// as a meaningful ranking; nominal factors use it only for coding.
    pub ordered: bool,
}

impl FactorSpec {
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Position of a label in the declared level order.
    pub fn level_index(&self, value: &str) -> Option<usize> {
        self.levels.iter().position(|l| *l == value)
    }
}

pub const PARTICIPANT_ID: &str = "participant_id";
pub const OUTCOME: &str = "intentions";

pub const FRAMING: FactorSpec = FactorSpec {
    column: "framing",
    levels: &["control", "pro-environmental", "self-enhancing"],
    ordered: false,
};

pub const NORM: FactorSpec = FactorSpec {
    column: "norm",
    levels: &["control", "convention", "descriptive", "social", "moral"],
    ordered: false,
};

pub const GENDER: FactorSpec = FactorSpec {
    column: "gender",
    levels: &["female", "male", "non-binary", "other", "prefer_not_to_say"],
    ordered: false,
};

pub const CLASS_LEVEL: FactorSpec = FactorSpec {
    column: "class_level",
    levels: &["freshman", "sophomore", "junior", "senior", "graduate"],
    ordered: false,
};

pub const EMPLOYMENT: FactorSpec = FactorSpec {
    column: "employment",
    levels: &["not_employed", "part_time", "full_time", "self_employed"],
    ordered: false,
};

pub const PARENTAL_EDUCATION: FactorSpec = FactorSpec {
    column: "parental_education",
    levels: &[
        "less_than_high_school",
        "high_school",
        "some_college",
        "bachelors",
        "masters",
        "doctorate",
    ],
    ordered: false,
};

pub const POLITICAL_ORIENTATION: FactorSpec = FactorSpec {
    column: "political_orientation",
    levels: &[
        "very_liberal",
        "liberal",
        "somewhat_liberal",
        "moderate",
        "somewhat_conservative",
        "conservative",
        "very_conservative",
        "prefer_not_to_say",
    ],
    ordered: true,
};

pub const ETHNICITY: FactorSpec = FactorSpec {
    column: "ethnicity",
    levels: &[
        "asian",
        "black",
        "hispanic_latino",
        "middle_eastern",
        "white",
        "multiracial",
        "other",
    ],
    ordered: false,
};

pub const BEHAVIORS: FactorSpec = FactorSpec {
    column: "behaviors",
    levels: &["never", "rarely", "sometimes", "often", "always"],
    ordered: true,
};

/// Continuous covariates, in model order. Each gets a mean-centered
/// companion column suffixed `_c`.
pub const COVARIATES: &[&str] = &[
    "biospheric",
    "egoistic",
    "ingroup_identification",
    "clothing_interest",
    "age",
];

pub const CENTERED_SUFFIX: &str = "_c";

pub fn centered_name(covariate: &str) -> String {
    format!("{}{}", covariate, CENTERED_SUFFIX)
}

/// All factor columns, in the order they are validated and recoded.
pub fn factors() -> Vec<FactorSpec> {
    vec![
        FRAMING,
        NORM,
        GENDER,
        CLASS_LEVEL,
        EMPLOYMENT,
        PARENTAL_EDUCATION,
        POLITICAL_ORIENTATION,
        ETHNICITY,
        BEHAVIORS,
    ]
}

/// Every column the input file must contain.
pub fn expected_columns() -> Vec<&'static str> {
    let mut cols = vec![PARTICIPANT_ID];
    cols.extend(factors().iter().map(|f| f.column));
    cols.extend(COVARIATES.iter().copied());
    cols.push(OUTCOME);
    cols
}

/// Columns kept after feature selection: everything the model touches plus
/// the retained demographic categoricals and the unused behaviors outcome.
pub fn selected_columns() -> Vec<&'static str> {
    expected_columns()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_levels_match_design() {
        assert_eq!(FRAMING.n_levels(), 3);
        assert_eq!(NORM.n_levels(), 5);
        assert_eq!(GENDER.n_levels(), 5);
        assert_eq!(POLITICAL_ORIENTATION.n_levels(), 8);
        assert!(POLITICAL_ORIENTATION.ordered);
    }

    #[test]
    fn level_index_follows_declared_order() {
        assert_eq!(FRAMING.level_index("control"), Some(0));
        assert_eq!(FRAMING.level_index("self-enhancing"), Some(2));
        assert_eq!(FRAMING.level_index("placebo"), None);
    }

    #[test]
    fn expected_columns_cover_model_inputs() {
        let cols = expected_columns();
        assert!(cols.contains(&"framing"));
        assert!(cols.contains(&"norm"));
        assert!(cols.contains(&"intentions"));
        for cov in COVARIATES {
            assert!(cols.contains(cov));
        }
    }
}
