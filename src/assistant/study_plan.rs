use log::{ info, warn };

use crate::llm::chat::ChatClient;
use crate::llm::GenerationParams;
use crate::models::chat::ChatMessage;
use crate::models::study_plan::{ LearningMethod, Level, StudyPlanRequest };

pub const MISSING_FIELDS: &str = "Please fill in all fields.";
pub const HOURS_OUT_OF_RANGE: &str = "Hours per week must be between 1 and 168.";
pub const EDUCATOR_PROMPT: &str = "You are an experienced educator and methodologist";

pub const MIN_HOURS_PER_WEEK: f64 = 1.0;
pub const MAX_HOURS_PER_WEEK: f64 = 168.0;

/// A request with every field present and in range.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyPlan<'a> {
    pub topic: &'a str,
    pub level: Level,
    pub hours_per_week: f64,
    pub method: LearningMethod,
    pub goal: &'a str,
}

pub fn validate(req: &StudyPlanRequest) -> Result<StudyPlan<'_>, &'static str> {
    let (level, hours_per_week, method) = match (req.level, req.hours_per_week, req.method) {
        (Some(level), Some(hours), Some(method)) if hours != 0.0 => (level, hours, method),
        _ => {
            return Err(MISSING_FIELDS);
        }
    };
    if req.topic.trim().is_empty() || req.goal.trim().is_empty() {
        return Err(MISSING_FIELDS);
    }
    if !(MIN_HOURS_PER_WEEK..=MAX_HOURS_PER_WEEK).contains(&hours_per_week) {
        return Err(HOURS_OUT_OF_RANGE);
    }

    Ok(StudyPlan {
        topic: &req.topic,
        level,
        hours_per_week,
        method,
        goal: &req.goal,
    })
}

/// Hours always carry a decimal point (`6.0`), the way the form's number field reports them.
pub fn build_instruction(plan: &StudyPlan<'_>) -> String {
    format!(
        "Create a detailed study plan for '{}' at {} level, \
         considering {:?} hours per week, with '{}' as the preferred learning method. \
         Learning goal: '{}'. \
         The plan should include: 1) Main learning stages \
         2) Time frames for each stage \
         3) Recommended materials and resources \
         4) Progress assessment methods",
        plan.topic,
        plan.level,
        plan.hours_per_week,
        plan.method,
        plan.goal
    )
}

/// Returns the plan text, or a human-readable message for invalid input and backend failures.
pub async fn generate_study_plan(client: &dyn ChatClient, req: &StudyPlanRequest) -> String {
    let plan = match validate(req) {
        Ok(plan) => plan,
        Err(message) => {
            return message.to_string();
        }
    };

    let messages = vec![
        ChatMessage::system(EDUCATOR_PROMPT),
        ChatMessage::user(build_instruction(&plan))
    ];

    info!("Generating study plan for '{}' ({}, {})", plan.topic, plan.level, plan.method);
    match client.complete(&messages, &GenerationParams::STUDY_PLAN).await {
        Ok(resp) => resp.response,
        Err(e) => {
            warn!("Study plan generation failed: {}", e);
            format!("Error generating plan: {}", e)
        }
    }
}
