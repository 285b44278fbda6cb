use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(flatten)]
    pub format: QuestionFormat,
}

/// How the candidate answers: by picking one of four labelled options, or in
/// free text that is recorded next to the model's answer outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionFormat {
    MultipleChoice {
        options: [String; 4],
        correct_option: OptionLetter,
    },
    Open {
        answer_outline: String,
    },
}

impl Question {
    pub fn options(&self) -> &[String] {
        match &self.format {
            QuestionFormat::MultipleChoice { options, .. } => options,
            QuestionFormat::Open { .. } => &[],
        }
    }

    pub fn correct_option(&self) -> Option<OptionLetter> {
        match self.format {
            QuestionFormat::MultipleChoice { correct_option, .. } => Some(correct_option),
            QuestionFormat::Open { .. } => None,
        }
    }

    pub fn option(&self, letter: OptionLetter) -> Option<&str> {
        self.options().get(letter.index()).map(String::as_str)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.format, QuestionFormat::Open { .. })
    }
}

/// Label of one of the four choices. Matching is case-sensitive: only the
/// uppercase letters are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "A" => Some(OptionLetter::A),
            "B" => Some(OptionLetter::B),
            "C" => Some(OptionLetter::C),
            "D" => Some(OptionLetter::D),
            _ => None,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn index(&self) -> usize {
        match self {
            OptionLetter::A => 0,
            OptionLetter::B => 1,
            OptionLetter::C => 2,
            OptionLetter::D => 3,
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}
