//! BMI-based visit routing.
//!
//! The latest stored BMI decides which visit form a patient completes next.
//! BMI is trusted as stored; it is never recomputed from height and weight
//! here.

mod listing;

pub use listing::*;

use serde::{Deserialize, Serialize};

use crate::models::Vitals;

/// BMI at or above which a patient is routed to visit form B.
pub const OVERWEIGHT_BMI: f64 = 25.0;

/// BMI below which a patient is labelled underweight.
pub const UNDERWEIGHT_BMI: f64 = 18.5;

/// Which visit form to present next.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VisitVariant {
    /// Diet assessment (BMI below 25)
    VisitA,
    /// Drug use assessment (BMI 25 and above)
    VisitB,
}

/// Pick the next visit form from the patient's most recent vitals.
///
/// A patient without vitals is treated as BMI 0.0.
pub fn next_visit_variant(latest: Option<&Vitals>) -> VisitVariant {
    variant_for_bmi(latest.map(|v| v.bmi).unwrap_or(0.0))
}

pub fn variant_for_bmi(bmi: f64) -> VisitVariant {
    if bmi >= OVERWEIGHT_BMI {
        VisitVariant::VisitB
    } else {
        VisitVariant::VisitA
    }
}

/// Display label for a BMI value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < UNDERWEIGHT_BMI {
            BmiCategory::Underweight
        } else if bmi < OVERWEIGHT_BMI {
            BmiCategory::Normal
        } else {
            BmiCategory::Overweight
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::Overweight => "Overweight",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn vitals(height_cm: f64, weight_kg: f64) -> Vitals {
        Vitals::record("P1".into(), Utc::now(), height_cm, weight_kg)
    }

    #[test]
    fn test_no_vitals_routes_to_form_a() {
        assert_eq!(next_visit_variant(None), VisitVariant::VisitA);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        // 64 / 1.6^2 == 25.0
        let v = vitals(160.0, 64.0);
        assert_eq!(next_visit_variant(Some(&v)), VisitVariant::VisitB);

        assert_eq!(variant_for_bmi(24.999), VisitVariant::VisitA);
        assert_eq!(variant_for_bmi(25.0), VisitVariant::VisitB);
    }

    #[test]
    fn test_stored_bmi_is_trusted() {
        let mut v = vitals(160.0, 40.0);
        v.bmi = 30.0;
        assert_eq!(next_visit_variant(Some(&v)), VisitVariant::VisitB);
    }

    #[test]
    fn test_bmi_category() {
        assert_eq!(BmiCategory::from_bmi(0.0), BmiCategory::Underweight);
        assert_eq!(BmiCategory::from_bmi(18.5), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(24.9), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(25.0), BmiCategory::Overweight);
        assert_eq!(BmiCategory::Overweight.as_str(), "Overweight");
    }

    proptest! {
        #[test]
        fn prop_variant_follows_threshold(height_cm in 50.0f64..250.0, weight_kg in 2.0f64..300.0) {
            let v = vitals(height_cm, weight_kg);
            let expected_bmi = weight_kg / ((height_cm / 100.0) * (height_cm / 100.0));
            prop_assert!((v.bmi - expected_bmi).abs() < 1e-9);

            let variant = next_visit_variant(Some(&v));
            if v.bmi >= OVERWEIGHT_BMI {
                prop_assert_eq!(variant, VisitVariant::VisitB);
            } else {
                prop_assert_eq!(variant, VisitVariant::VisitA);
            }
        }
    }
}
