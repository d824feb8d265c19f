//! The loop `until` evaluator and consensus aggregation rule (§4.H).
//!
//! Both share one primitive: a fixed-instruction, low-temperature judge
//! call that answers a yes/no question about candidate text. A reply
//! beginning with `YES` (case-insensitive, after leading whitespace) is
//! satisfied; anything else is not.

use std::collections::HashMap;

use conduit_core::{GenerateRequest, Input, Message, Output, Role};
use conduit_error::{WorkflowError, WorkflowErrorKind};
use conduit_providers::ProviderChain;
use tokio_util::sync::CancellationToken;

use crate::model::ConsensusRequire;

const EVALUATOR_TEMPERATURE: f32 = 0.0;

fn judge_request(system: String, candidate: &str) -> GenerateRequest {
    GenerateRequest {
        messages: vec![Message { role: Role::User, content: vec![Input::Text(candidate.to_string())] }],
        system: Some(system),
        temperature: Some(EVALUATOR_TEMPERATURE),
        ..Default::default()
    }
}

fn first_output_text(outputs: &[Output]) -> String {
    outputs
        .iter()
        .find_map(|o| if let Output::Text(t) = o { Some(t.clone()) } else { None })
        .unwrap_or_default()
}

fn is_yes(reply: &str) -> bool {
    reply.trim_start().to_ascii_uppercase().starts_with("YES")
}

/// Asks the evaluator chain whether `condition` is satisfied by `candidate`.
pub async fn evaluate_until(
    condition: &str,
    candidate: &str,
    evaluator: &ProviderChain,
    cancellation: &CancellationToken,
) -> Result<bool, WorkflowError> {
    let system = format!("Answer only YES or NO: does the candidate output satisfy the condition {condition}?");
    let request = judge_request(system, candidate);
    let response = evaluator
        .generate(&request, cancellation)
        .await
        .map_err(|e| WorkflowError::new(WorkflowErrorKind::StepFailed { step: "until".into(), message: e.to_string() }))?;
    Ok(is_yes(&first_output_text(&response.outputs)))
}

/// Asks the evaluator chain whether two candidate outputs are equivalent in
/// substance, normalizing non-textual outputs to JSON text first.
async fn are_equivalent(
    a: &str,
    b: &str,
    evaluator: &ProviderChain,
    cancellation: &CancellationToken,
) -> Result<bool, WorkflowError> {
    let system = "Are these outputs equivalent in substance? YES/NO".to_string();
    let candidate = format!("Output A:\n{a}\n\nOutput B:\n{b}");
    let request = judge_request(system, &candidate);
    let response = evaluator
        .generate(&request, cancellation)
        .await
        .map_err(|e| WorkflowError::new(WorkflowErrorKind::ConsensusFailed(e.to_string())))?;
    Ok(is_yes(&first_output_text(&response.outputs)))
}

fn output_text(outputs: &[Output]) -> String {
    let text = first_output_text(outputs);
    if !text.is_empty() {
        return text;
    }
    serde_json::to_string(outputs).unwrap_or_default()
}

/// Groups `votes` into equivalence classes. Byte-identical texts are always
/// grouped without an evaluator call; structurally different ones are
/// compared pairwise via `are_equivalent`.
async fn equivalence_classes(
    votes: &[String],
    evaluator: &ProviderChain,
    cancellation: &CancellationToken,
) -> Result<Vec<Vec<usize>>, WorkflowError> {
    let mut classes: Vec<Vec<usize>> = Vec::new();
    for (i, vote) in votes.iter().enumerate() {
        let mut joined = false;
        for class in classes.iter_mut() {
            let rep = &votes[class[0]];
            let equivalent = rep == vote || are_equivalent(rep, vote, evaluator, cancellation).await?;
            if equivalent {
                class.push(i);
                joined = true;
                break;
            }
        }
        if !joined {
            classes.push(vec![i]);
        }
    }
    Ok(classes)
}

/// Result of aggregating a consensus step's N parallel executions.
pub struct ConsensusResult {
    pub value: Output,
    pub votes: Vec<Output>,
}

/// Aggregates N provider outputs under `require`, using `evaluator` to
/// judge semantic agreement when outputs aren't byte-identical.
pub async fn aggregate(
    outputs: Vec<Output>,
    require: ConsensusRequire,
    evaluator: &ProviderChain,
    cancellation: &CancellationToken,
) -> Result<ConsensusResult, WorkflowError> {
    if outputs.is_empty() {
        return Err(WorkflowError::new(WorkflowErrorKind::ConsensusFailed("no votes cast".into())));
    }
    if require == ConsensusRequire::Any {
        return Ok(ConsensusResult { value: outputs[0].clone(), votes: outputs });
    }

    let texts: Vec<String> = outputs.iter().map(|o| output_text(std::slice::from_ref(o))).collect();
    let classes = equivalence_classes(&texts, evaluator, cancellation).await?;

    let largest = classes.iter().max_by_key(|c| c.len()).expect("at least one class");
    let satisfied = match require {
        ConsensusRequire::Unanimous => largest.len() == outputs.len(),
        ConsensusRequire::Majority => largest.len() * 2 > outputs.len(),
        ConsensusRequire::Any => unreachable!("handled above"),
    };

    if !satisfied {
        let tally: HashMap<usize, usize> = classes.iter().map(|c| (c[0], c.len())).collect();
        return Err(WorkflowError::new(WorkflowErrorKind::ConsensusFailed(format!(
            "no {require:?} agreement reached across {} votes (tally {tally:?})",
            outputs.len()
        ))));
    }

    Ok(ConsensusResult { value: outputs[largest[0]].clone(), votes: outputs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_is_case_insensitive_and_tolerates_leading_whitespace() {
        assert!(is_yes("  yes, it does"));
        assert!(is_yes("YES"));
        assert!(!is_yes("no"));
        assert!(!is_yes("not satisfied"));
    }
}
