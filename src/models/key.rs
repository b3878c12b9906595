// src/models/key.rs
use std::fmt;

/// Subject a model was trained for. Codes match the artifact file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    Math,
    Language,
}

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::Math, Subject::Language];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Language => "por",
        }
    }

    /// Parses the subject label sent by clients. Only the enumerated subjects
    /// are accepted; anything else is rejected rather than guessed.
    pub fn from_request(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mathematics" | "math" => Some(Subject::Math),
            "portuguese" | "language" | "por" => Some(Subject::Language),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_request(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Grading period. `Final` is the prediction target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Period1,
    Period2,
    Final,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Period1, Period::Period2, Period::Final];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Period1 => "G1",
            Period::Period2 => "G2",
            Period::Final => "G3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "G1" => Some(Period::Period1),
            "G2" => Some(Period::Period2),
            "G3" => Some(Period::Final),
            _ => None,
        }
    }
}

/// Composite address of a model in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelKey {
    pub subject: Subject,
    pub gender: Gender,
    pub period: Period,
}

impl ModelKey {
    pub fn new(subject: Subject, gender: Gender, period: Period) -> Self {
        Self {
            subject,
            gender,
            period,
        }
    }

    /// Every key the registry scans for, in a stable order.
    pub fn all() -> impl Iterator<Item = ModelKey> {
        Subject::ALL.into_iter().flat_map(|subject| {
            Gender::ALL.into_iter().flat_map(move |gender| {
                Period::ALL
                    .into_iter()
                    .map(move |period| ModelKey::new(subject, gender, period))
            })
        })
    }

    /// Inverse of `Display`, e.g. `math_female_G3`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('_');
        let subject = match parts.next()? {
            "math" => Subject::Math,
            "por" => Subject::Language,
            _ => return None,
        };
        let gender = Gender::from_request(parts.next()?)?;
        let period = Period::from_code(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(subject, gender, period))
    }

    pub fn file_name(&self) -> String {
        format!("{}_model.json", self)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.subject.as_str(),
            self.gender.as_str(),
            self.period.as_str()
        )
    }
}
