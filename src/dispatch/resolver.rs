//! Overload resolution by trial unmarshalling.
//!
//! With several candidates behind one `(name, arity)` key, each candidate
//! is scored by trial-unmarshalling every wire argument against its
//! declared parameter shape; a candidate whose argument fails outright is
//! rejected. The lowest aggregate mismatch wins. Exact ties fall back to
//! signature specificity (the primitive ladder plus assignability), and
//! persistent ties go to the first registered candidate.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::match_score::MatchScore;
use crate::serialize::Serializer;

use super::{DispatchError, MethodSpec};

/// Select the best overload for the given JSON arguments.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub fn select_method(
    serializer: &Serializer,
    candidates: &[Arc<MethodSpec>],
    args: &[Value],
) -> Result<Arc<MethodSpec>, DispatchError> {
    match candidates {
        [] => unreachable!("callers map empty candidate sets to NoSuchMethod"),
        [only] => return Ok(Arc::clone(only)),
        _ => {}
    }

    let mut best: Option<(Arc<MethodSpec>, MatchScore)> = None;
    let mut first_rejection: Option<DispatchError> = None;

    for candidate in candidates {
        match score_candidate(serializer, candidate, args) {
            Ok(score) => {
                debug!(method = candidate.name(), score = %score, "scored overload candidate");
                best = Some(match best.take() {
                    None => (Arc::clone(candidate), score),
                    Some((current, current_score)) => {
                        if score < current_score {
                            (Arc::clone(candidate), score)
                        } else if score == current_score
                            && prefer_second(&current, candidate)
                        {
                            (Arc::clone(candidate), score)
                        } else {
                            (current, current_score)
                        }
                    }
                });
            }
            Err(err) => {
                first_rejection.get_or_insert(err);
            }
        }
    }

    match best {
        Some((chosen, _)) => Ok(chosen),
        None => Err(first_rejection.expect("no candidates scored and none rejected")),
    }
}

/// Aggregate fitness of one candidate: the worst positional mismatch.
fn score_candidate(
    serializer: &Serializer,
    candidate: &MethodSpec,
    args: &[Value],
) -> Result<MatchScore, DispatchError> {
    let mut score = MatchScore::EXACT;
    for (spec, arg) in candidate.wire_params().zip(args) {
        score = score.worse(serializer.try_unmarshal(spec, arg)?);
    }
    Ok(score)
}

/// Specificity tie-break: `true` when `challenger` beats `incumbent`.
///
/// Per differing wire position the more specific side scores a win; the
/// side with more wins takes the tie. An overall tie keeps the incumbent,
/// which is the earlier-registered candidate.
fn prefer_second(incumbent: &MethodSpec, challenger: &MethodSpec) -> bool {
    let mut incumbent_wins = 0_u32;
    let mut challenger_wins = 0_u32;
    for (a, b) in incumbent.wire_params().zip(challenger.wire_params()) {
        match a.more_specific_than(b) {
            Some(true) => incumbent_wins += 1,
            Some(false) => challenger_wins += 1,
            None => {}
        }
    }
    challenger_wins > incumbent_wins
}
