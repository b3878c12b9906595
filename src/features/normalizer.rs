// src/features/normalizer.rs
//! Maps a raw request onto the base feature schema.

use log::debug;

use super::raw::RawInput;
use super::schema::{FeatureKind, FeatureSchema};
use super::vector::FeatureVector;
use crate::error::PredictionError;

/// Normalizes a request into the base schema.
///
/// Range fields are min-max scaled without clamping, so out-of-domain input
/// (an age of 25, say) produces values outside [0, 1]. Unknown categorical
/// labels leave their indicator group all zero.
pub fn normalize(raw: &RawInput) -> Result<FeatureVector, PredictionError> {
    let schema = FeatureSchema::base();
    let mut values = vec![0.0; schema.len()];

    for (position, spec) in schema.features().iter().enumerate() {
        values[position] = match spec.kind {
            FeatureKind::Direct => direct_value(raw, spec.source)?,
            FeatureKind::Equals(sentinel) => indicator(raw.text(spec.source) == Some(sentinel)),
            FeatureKind::Range { min, max } => {
                let value = match raw.get(spec.source) {
                    None => min,
                    Some(value) => value.to_number().ok_or_else(|| {
                        PredictionError::validation(format!(
                            "Field '{}' must be numeric",
                            spec.source
                        ))
                    })?,
                };
                range_normalize(value, min, max)
            }
            FeatureKind::Binary => {
                indicator(raw.get(spec.source).is_some_and(|value| value.is_affirmative()))
            }
            FeatureKind::OneHot(category) => indicator(raw.text(spec.source) == Some(category)),
            // Engineered features depend on the values above; filled in below.
            FeatureKind::GradeAverage
            | FeatureKind::AverageAlcohol
            | FeatureKind::CompositeRisk
            | FeatureKind::PriorGrade => 0.0,
        };
    }

    let value_of = |name: &str| -> Result<f64, PredictionError> {
        let position = schema.require(name).map_err(PredictionError::Internal)?;
        Ok(values[position])
    };
    let weekday_alcohol = value_of("Dalc")?;
    let weekend_alcohol = value_of("Walc")?;
    let avg_alcohol = average_alcohol(weekday_alcohol, weekend_alcohol);
    let risk = composite_risk(
        value_of("failures")?,
        value_of("absences")?,
        weekday_alcohol,
        weekend_alcohol,
        value_of("studytime")?,
        value_of("freetime")?,
    );
    let grade_avg = grade_average(raw)?;

    for (position, spec) in schema.features().iter().enumerate() {
        match spec.kind {
            FeatureKind::GradeAverage => values[position] = grade_avg,
            FeatureKind::AverageAlcohol => values[position] = avg_alcohol,
            FeatureKind::CompositeRisk => values[position] = risk,
            _ => {}
        }
    }

    debug!(
        "Normalized {} raw fields into {} base features (avg_alcohol={:.3}, composite_risk={:.3})",
        raw.len(),
        values.len(),
        avg_alcohol,
        risk
    );
    Ok(FeatureVector::from_values(schema, values))
}

/// Normalizes a request and appends the given prior-period grades, producing
/// an extended-schema vector.
pub fn normalize_extended(
    raw: &RawInput,
    period1: f64,
    period2: f64,
) -> Result<FeatureVector, PredictionError> {
    let base = normalize(raw)?;
    base.with_prior_grades(period1, period2)
        .map_err(PredictionError::Internal)
}

pub fn range_normalize(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}

/// Mean of normalized weekday and weekend alcohol use.
pub fn average_alcohol(weekday: f64, weekend: f64) -> f64 {
    (weekday + weekend) / 2.0
}

/// Behavioral risk composite over already-normalized inputs. Typically in
/// [0, 1] but not bounded.
pub fn composite_risk(
    failures: f64,
    absences: f64,
    weekday_alcohol: f64,
    weekend_alcohol: f64,
    studytime: f64,
    freetime: f64,
) -> f64 {
    (2.0 * failures
        + 1.5 * absences
        + weekday_alcohol
        + weekend_alcohol
        + (1.0 - studytime)
        + 0.5 * freetime)
        / 6.0
}

/// Average of the raw G1/G2 grades when the request carries both, else 0.
fn grade_average(raw: &RawInput) -> Result<f64, PredictionError> {
    match (raw.optional_grade("G1")?, raw.optional_grade("G2")?) {
        (Some(period1), Some(period2)) => Ok((period1 + period2) / 2.0),
        _ => Ok(0.0),
    }
}

fn direct_value(raw: &RawInput, field: &str) -> Result<f64, PredictionError> {
    match raw.get(field) {
        None => Ok(0.0),
        Some(value) => value.to_integer().map(|n| n as f64).ok_or_else(|| {
            PredictionError::validation(format!("Field '{}' must be an integer", field))
        }),
    }
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::raw::RawValue;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn range_specs() -> Vec<(&'static str, f64, f64)> {
        FeatureSchema::base()
            .features()
            .iter()
            .filter_map(|spec| match spec.kind {
                FeatureKind::Range { min, max } => Some((spec.source, min, max)),
                _ => None,
            })
            .collect()
    }

    fn representative_input() -> RawInput {
        RawInput::new()
            .with("gender", "female")
            .with("school", 1.0)
            .with("age", 17.0)
            .with("Medu", 2.0)
            .with("Fedu", 3.0)
            .with("traveltime", 2.0)
            .with("studytime", 2.0)
            .with("failures", 1.0)
            .with("famrel", 3.0)
            .with("freetime", 3.0)
            .with("goout", 3.0)
            .with("Dalc", 2.0)
            .with("Walc", 3.0)
            .with("health", 3.0)
            .with("absences", 6.0)
            .with("internet", "yes")
            .with("Mjob", "teacher")
            .with("Fjob", "services")
            .with("reason", "course")
            .with("guardian", "mother")
    }

    #[test]
    fn test_output_covers_base_schema() {
        let vector = normalize(&representative_input()).unwrap();
        assert!(std::ptr::eq(vector.schema(), FeatureSchema::base()));
        assert_eq!(vector.len(), 46);
    }

    #[test]
    fn test_range_boundaries_map_to_zero_and_one() {
        for (field, min, max) in range_specs() {
            let low = normalize(&RawInput::new().with(field, min)).unwrap();
            let high = normalize(&RawInput::new().with(field, max)).unwrap();
            assert_eq!(low.get(field), Some(0.0), "min of {}", field);
            assert_eq!(high.get(field), Some(1.0), "max of {}", field);
        }
    }

    #[test]
    fn test_absent_range_fields_default_to_min() {
        let vector = normalize(&RawInput::new()).unwrap();
        for (field, _, _) in range_specs() {
            assert_eq!(vector.get(field), Some(0.0), "{}", field);
        }
    }

    #[test]
    fn test_out_of_domain_values_are_not_clamped() {
        let vector = normalize(&RawInput::new().with("age", 25.0).with("absences", -3.0)).unwrap();
        assert!((vector.get("age").unwrap() - 10.0 / 7.0).abs() < 1e-12);
        assert!(vector.get("absences").unwrap() < 0.0);
    }

    #[test]
    fn test_numeric_text_is_accepted() {
        let vector = normalize(&RawInput::new().with("age", "22")).unwrap();
        assert_eq!(vector.get("age"), Some(1.0));
    }

    #[test]
    fn test_non_numeric_range_value_is_rejected() {
        let err = normalize(&RawInput::new().with("age", "seventeen")).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_direct_fields_are_integer_coerced() {
        let vector = normalize(&RawInput::new().with("school", "1").with("famsize", true)).unwrap();
        assert_eq!(vector.get("school"), Some(1.0));
        assert_eq!(vector.get("famsize"), Some(1.0));
        assert_eq!(vector.get("address"), Some(0.0));

        let err = normalize(&RawInput::new().with("Pstatus", "T")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_sex_follows_gender_sentinel() {
        let male = normalize(&RawInput::new().with("gender", "male")).unwrap();
        let female = normalize(&RawInput::new().with("gender", "female")).unwrap();
        assert_eq!(male.get("sex"), Some(1.0));
        assert_eq!(female.get("sex"), Some(0.0));
    }

    #[test]
    fn test_binary_flags() {
        let cases: Vec<(RawValue, f64)> = vec![
            (RawValue::from("yes"), 1.0),
            (RawValue::from("1"), 1.0),
            (RawValue::from(1.0), 1.0),
            (RawValue::from(true), 1.0),
            (RawValue::from("no"), 0.0),
            (RawValue::from(false), 0.0),
            (RawValue::from("maybe"), 0.0),
        ];
        for (value, expected) in cases {
            let vector = normalize(&RawInput::new().with("higher", value.clone())).unwrap();
            assert_eq!(vector.get("higher"), Some(expected), "{:?}", value);
        }
    }

    #[test]
    fn test_one_hot_groups_have_single_hot_for_known_category() {
        let groups: [(&str, &[&str]); 4] = [
            ("Mjob", &["at_home", "health", "other", "services", "teacher"]),
            ("Fjob", &["at_home", "health", "other", "services", "teacher"]),
            ("reason", &["course", "home", "other", "reputation"]),
            ("guardian", &["father", "mother", "other"]),
        ];
        for (field, categories) in groups {
            for category in categories.iter() {
                let vector = normalize(&RawInput::new().with(field, *category)).unwrap();
                for other in categories.iter() {
                    let expected = if other == category { 1.0 } else { 0.0 };
                    let name = format!("{}_{}", field, other);
                    assert_eq!(vector.get(&name), Some(expected), "{}={}", field, category);
                }
            }

            let unknown = normalize(&RawInput::new().with(field, "astronaut")).unwrap();
            for other in categories.iter() {
                assert_eq!(unknown.get(&format!("{}_{}", field, other)), Some(0.0));
            }
        }
    }

    #[test]
    fn test_engineered_features_match_formulas() {
        let vector = normalize(&representative_input()).unwrap();
        let dalc = vector.get("Dalc").unwrap();
        let walc = vector.get("Walc").unwrap();
        assert_eq!(vector.get("Avgalc"), Some((dalc + walc) / 2.0));

        let expected_risk = (2.0 * vector.get("failures").unwrap()
            + 1.5 * vector.get("absences").unwrap()
            + dalc
            + walc
            + (1.0 - vector.get("studytime").unwrap())
            + 0.5 * vector.get("freetime").unwrap())
            / 6.0;
        assert_eq!(vector.get("Bum"), Some(expected_risk));
    }

    #[test]
    fn test_grade_average_requires_both_grades() {
        let both = normalize(&RawInput::new().with("G1", 10.0).with("G2", 13.0)).unwrap();
        assert_eq!(both.get("Gvg"), Some(11.5));

        let one = normalize(&RawInput::new().with("G1", 10.0)).unwrap();
        assert_eq!(one.get("Gvg"), Some(0.0));

        let blank = normalize(&RawInput::new().with("G1", 10.0).with("G2", "")).unwrap();
        assert_eq!(blank.get("Gvg"), Some(0.0));
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut raw = RawInput::new();
            for (field, min, max) in range_specs() {
                raw.insert(field, rng.gen_range(min..=max));
            }
            let first = normalize(&raw).unwrap();
            let second = normalize(&raw).unwrap();
            let bits = |v: &FeatureVector| -> Vec<u64> {
                v.as_slice().iter().map(|x| x.to_bits()).collect()
            };
            assert_eq!(bits(&first), bits(&second));
        }
    }

    #[test]
    fn test_normalize_extended_appends_grades() {
        let vector = normalize_extended(&representative_input(), 10.0, 12.0).unwrap();
        assert_eq!(vector.len(), 48);
        assert_eq!(vector.get("Gvg"), Some(11.0));
        assert_eq!(vector.get("G2"), Some(12.0));
    }
}
