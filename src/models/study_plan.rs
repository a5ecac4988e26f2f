use serde::{ de, Deserialize, Deserializer, Serialize };
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            _ => Err(format!("Invalid knowledge level: '{}'", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningMethod {
    Visual,
    Auditory,
    Practical,
    Reading,
}

impl fmt::Display for LearningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LearningMethod::Visual => "Visual",
            LearningMethod::Auditory => "Auditory",
            LearningMethod::Practical => "Practical",
            LearningMethod::Reading => "Reading",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LearningMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "visual" => Ok(LearningMethod::Visual),
            "auditory" => Ok(LearningMethod::Auditory),
            "practical" => Ok(LearningMethod::Practical),
            "reading" => Ok(LearningMethod::Reading),
            _ => Err(format!("Invalid learning method: '{}'", s)),
        }
    }
}

/// Study plan form as submitted; any field may still be unset. Form widgets send
/// `""` for an untouched choice, which reads as unset rather than as a parse error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default, deserialize_with = "form_choice")]
    pub level: Option<Level>,
    #[serde(default, deserialize_with = "form_hours")]
    pub hours_per_week: Option<f64>,
    #[serde(default, deserialize_with = "form_choice")]
    pub method: Option<LearningMethod>,
    #[serde(default)]
    pub goal: String,
}

fn form_choice<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where D: Deserializer<'de>, T: FromStr<Err = String>
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(choice) => choice.parse().map(Some).map_err(de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HoursField {
    Number(f64),
    Text(String),
}

fn form_hours<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where D: Deserializer<'de>
{
    match Option::<HoursField>::deserialize(deserializer)? {
        None => Ok(None),
        Some(HoursField::Number(hours)) => Ok(Some(hours)),
        Some(HoursField::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(HoursField::Text(text)) =>
            text
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| de::Error::custom(format!("Invalid hours per week '{}': {}", text, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_choices() {
        assert_eq!("intermediate".parse::<Level>().unwrap(), Level::Intermediate);
        assert_eq!("Reading".parse::<LearningMethod>().unwrap(), LearningMethod::Reading);
        assert!("expert".parse::<Level>().is_err());
    }

    #[test]
    fn missing_fields_deserialize_as_unset() {
        let req: StudyPlanRequest = serde_json::from_str(r#"{"topic":"Rust","level":"Beginner"}"#).unwrap();
        assert_eq!(req.topic, "Rust");
        assert_eq!(req.level, Some(Level::Beginner));
        assert_eq!(req.hours_per_week, None);
        assert_eq!(req.method, None);
        assert!(req.goal.is_empty());
    }

    #[test]
    fn blank_form_choices_deserialize_as_unset() {
        let req: StudyPlanRequest = serde_json::from_str(
            r#"{"topic":"Rust","level":"","hours_per_week":"","method":"  ","goal":"x"}"#
        ).unwrap();
        assert_eq!(req.level, None);
        assert_eq!(req.hours_per_week, None);
        assert_eq!(req.method, None);
    }

    #[test]
    fn form_choices_are_case_insensitive() {
        let req: StudyPlanRequest = serde_json::from_str(
            r#"{"level":"beginner","hours_per_week":"4.5","method":"visual"}"#
        ).unwrap();
        assert_eq!(req.level, Some(Level::Beginner));
        assert_eq!(req.hours_per_week, Some(4.5));
        assert_eq!(req.method, Some(LearningMethod::Visual));
    }

    #[test]
    fn unknown_choice_is_still_an_error() {
        let err = serde_json::from_str::<StudyPlanRequest>(r#"{"level":"expert"}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid knowledge level"));
    }
}
