use crate::gateway::{ExecutionResult, Row};
use crate::llm::LlmManager;
use crate::llm::models::ChatMessage;
use crate::report::Ignored;
use crate::report::empty::EmptyResultAnalysis;
use crate::report::fields::humanize;
use serde_json::Value;
use std::fmt::Write;
use tracing::debug;

const DETAIL_KEYWORDS: &[&str] = &[
    "show",
    "list",
    "breakdown",
    "break down",
    "by project",
    "by category",
    "by month",
    "each",
    "every",
    "all ",
    "table",
    "details",
    "compare",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub insights: Option<String>,
}

/// True when the user asked for rows rather than a single figure.
pub fn wants_details(question: &str) -> bool {
    let question = question.to_lowercase();
    DETAIL_KEYWORDS.iter().any(|k| question.contains(k))
}

fn sample(rows: &[Row], limit: usize) -> String {
    let sampled = &rows[..rows.len().min(limit)];
    serde_json::to_string_pretty(sampled).unwrap_or_else(|_| "[]".to_string())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "no value".to_string(),
        other => other.to_string(),
    }
}

/// Answer used when the model cannot be reached or says nothing useful.
pub fn fallback_answer(result: &ExecutionResult) -> String {
    match result.rows.as_slice() {
        [] => "I didn't find any data matching that question.".to_string(),
        [row] if row.len() == 1 => row
            .iter()
            .next()
            .map(|(key, value)| format!("{}: {}", humanize(key), display_value(value)))
            .unwrap_or_default(),
        _ => format!("Found {} results.", result.row_count),
    }
}

/// Appends the analyst's suggestions not already present in the text.
pub fn embed_suggestions(mut text: String, analysis: &EmptyResultAnalysis) -> String {
    let missing: Vec<&String> = analysis
        .suggestions
        .iter()
        .filter(|s| !text.contains(s.as_str()))
        .collect();

    if !missing.is_empty() {
        text.push_str("\n\nYou could try:");
        for suggestion in missing {
            let _ = write!(text, "\n- {}", suggestion);
        }
    }
    if let Some(alternative) = &analysis.alternative_question {
        if !text.contains(alternative.as_str()) {
            let _ = write!(text, "\n\nFor example: \"{}\"", alternative);
        }
    }
    text
}

async fn request_answer(
    llm: &LlmManager,
    question: &str,
    sql: &str,
    result: &ExecutionResult,
    analysis: Option<&EmptyResultAnalysis>,
    sample_rows: usize,
) -> Result<String, Ignored> {
    let mut prompt = format!(
        "Question: {}\n\nSQL:\n{}\n\nRow count: {}{}\n\nRows:\n{}",
        question,
        sql,
        result.row_count,
        if result.truncated { " (truncated)" } else { "" },
        sample(&result.rows, sample_rows)
    );
    if let Some(analysis) = analysis {
        let _ = write!(
            prompt,
            "\n\nWhy it may be empty: {}\nSuggestions: {}",
            analysis.reason,
            analysis.suggestions.join("; ")
        );
    }

    let messages = [
        ChatMessage::system(
            "You answer questions about construction projects from query results. Reply in one to \
             three plain sentences. State figures exactly as they appear, with units where obvious. \
             Do not mention SQL.",
        ),
        ChatMessage::user(prompt),
    ];

    let text = llm.complete(&messages).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(Ignored);
    }
    Ok(text.to_string())
}

async fn request_insights(
    llm: &LlmManager,
    question: &str,
    result: &ExecutionResult,
    sample_rows: usize,
) -> Result<String, Ignored> {
    let messages = [
        ChatMessage::system(
            "Give 2 to 5 short bullet-point observations about the rows below: outliers, totals, \
             trends or anything a project manager should act on. Each bullet starts with \"- \".",
        ),
        ChatMessage::user(format!(
            "Question: {}\n\nRows ({} total):\n{}",
            question,
            result.row_count,
            sample(&result.rows, sample_rows)
        )),
    ];

    let text = llm.complete(&messages).await?;
    let bullets = text
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('-') || l.starts_with('*') || l.starts_with('•'))
        .take(5)
        .collect::<Vec<_>>();
    if bullets.is_empty() {
        debug!("Insight reply had no bullets");
        return Err(Ignored);
    }
    Ok(bullets.join("\n"))
}

/// Narrative answer, plus insights when the question wants detail over more than two rows.
pub async fn synthesize(
    llm: &LlmManager,
    question: &str,
    sql: &str,
    result: &ExecutionResult,
    analysis: Option<&EmptyResultAnalysis>,
    sample_rows: usize,
) -> Answer {
    let text = request_answer(llm, question, sql, result, analysis, sample_rows)
        .await
        .unwrap_or_else(|Ignored| fallback_answer(result));

    let text = match analysis {
        Some(analysis) if result.row_count == 0 => embed_suggestions(text, analysis),
        _ => text,
    };

    let insights = if wants_details(question) && result.row_count > 2 {
        request_insights(llm, question, result, sample_rows).await.ok()
    } else {
        None
    };

    Answer { text, insights }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::llm::testing::{Scripted, ScriptedModel, manager};
    use serde_json::json;
    use std::sync::Arc;

    fn result(rows: Value) -> ExecutionResult {
        let rows: Vec<Row> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect();
        ExecutionResult::capped(rows, 1000)
    }

    #[test]
    fn detail_keywords() {
        assert!(wants_details("Show me projects over budget"));
        assert!(wants_details("expenses breakdown by project"));
        assert!(!wants_details("How many hours did Johnny work last week?"));
    }

    #[test]
    fn templated_answers() {
        assert_eq!(fallback_answer(&result(json!([]))), "I didn't find any data matching that question.");
        assert_eq!(fallback_answer(&result(json!([{ "total_hours": 32.5 }]))), "Total Hours: 32.5");
        assert_eq!(fallback_answer(&result(json!([{ "a": 1 }, { "a": 2 }]))), "Found 2 results.");
    }

    #[test]
    fn suggestions_are_not_repeated() {
        let analysis = EmptyResultAnalysis {
            reason: "none".to_string(),
            suggestions: vec!["Widen the dates".to_string(), "Check names".to_string()],
            alternative_question: None,
        };
        let text = embed_suggestions("Nothing found. Widen the dates".to_string(), &analysis);
        assert_eq!(text, "Nothing found. Widen the dates\n\nYou could try:\n- Check names");
    }

    #[tokio::test]
    async fn model_failure_uses_template_and_skips_insights_for_scalars() {
        let model = Arc::new(ScriptedModel::new(vec![Scripted::Text(Err(
            LlmError::ConnectionError("down".to_string()),
        ))]));
        let answer = synthesize(
            &manager(model.clone()),
            "Show total hours",
            "SELECT 1",
            &result(json!([{ "total_hours": 40 }])),
            None,
            20,
        )
        .await;
        assert_eq!(answer.text, "Total Hours: 40");
        assert_eq!(answer.insights, None);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn insights_for_detailed_questions() {
        let model = Arc::new(ScriptedModel::new(vec![
            Scripted::Text(Ok("Three projects are over budget.".to_string())),
            Scripted::Text(Ok("Observations:\n- Miller is furthest over\n- Two are residential".to_string())),
        ]));
        let answer = synthesize(
            &manager(model),
            "List projects over budget",
            "SELECT 1",
            &result(json!([{ "p": "a" }, { "p": "b" }, { "p": "c" }])),
            None,
            20,
        )
        .await;
        assert_eq!(answer.text, "Three projects are over budget.");
        assert_eq!(
            answer.insights.as_deref(),
            Some("- Miller is furthest over\n- Two are residential")
        );
    }

    fn sampled_rows(message: &str, marker: &str) -> Vec<Value> {
        let (_, rows) = message.split_once(marker).unwrap();
        serde_json::from_str(rows).unwrap()
    }

    #[tokio::test]
    async fn prompts_carry_twenty_rows_but_the_full_count() {
        let model = Arc::new(ScriptedModel::new(vec![
            Scripted::Text(Ok("25 projects are active.".to_string())),
            Scripted::Text(Ok("- Most are residential\n- Two started this month".to_string())),
        ]));
        let rows: Vec<Value> = (1..=25).map(|i| json!({ "project_number": i })).collect();

        let answer = synthesize(
            &manager(model.clone()),
            "List all active projects",
            "SELECT project_number FROM projects",
            &result(Value::Array(rows)),
            None,
            20,
        )
        .await;
        assert!(answer.insights.is_some());

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);

        let answer_prompt = &calls[0][1].content;
        assert!(answer_prompt.contains("Row count: 25"));
        let sampled = sampled_rows(answer_prompt, "\n\nRows:\n");
        assert_eq!(sampled.len(), 20);
        assert_eq!(sampled[19]["project_number"], 20);

        let insight_prompt = &calls[1][1].content;
        assert!(insight_prompt.contains("(25 total)"));
        assert_eq!(sampled_rows(insight_prompt, "total):\n").len(), 20);
    }

    #[tokio::test]
    async fn two_rows_never_ask_for_insights() {
        let model = Arc::new(ScriptedModel::new(vec![Scripted::Text(Ok(
            "Two projects are over budget.".to_string(),
        ))]));
        let answer = synthesize(
            &manager(model.clone()),
            "List projects over budget",
            "SELECT 1",
            &result(json!([{ "p": "a" }, { "p": "b" }])),
            None,
            20,
        )
        .await;
        assert_eq!(answer.text, "Two projects are over budget.");
        assert_eq!(answer.insights, None);
        assert_eq!(model.call_count(), 1);
    }
}
