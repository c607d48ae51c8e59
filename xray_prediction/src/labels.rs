use std::fmt;

/// Number of outputs the classifier head produces.
pub const CLASS_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    Covid19,
    Normal,
    ViralPneumonia,
}

impl Diagnosis {
    /// Ordered by the classifier's output index.
    pub const ALL: [Diagnosis; CLASS_COUNT] = [
        Diagnosis::Covid19,
        Diagnosis::Normal,
        Diagnosis::ViralPneumonia,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::Covid19 => "The Person is Infected With COVID-19 disease",
            Diagnosis::Normal => "The Person is Normal",
            Diagnosis::ViralPneumonia => "The Person is Infected With Viral Pneumonia",
        }
    }

    /// Short name used as a metrics attribute.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Diagnosis::Covid19 => "covid19",
            Diagnosis::Normal => "normal",
            Diagnosis::ViralPneumonia => "viral_pneumonia",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of the largest score. Ties resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .copied()
        .enumerate()
        .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .map(|(index, _)| index)
}
