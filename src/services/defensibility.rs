use serde::Serialize;

use crate::services::dates::duration_minutes;

/// Attendee threshold for the "more people" criterion.
const MIN_PEOPLE: i64 = 3;
/// Minimum event duration for the "more duration" criterion: 4.5 hours.
const MIN_DURATION_MINUTES: i64 = 270;

/// Inputs the score is derived from; a plain projection of the event form.
#[derive(Debug, Clone, Default)]
pub struct ScoreInputs<'a> {
    pub description: &'a str,
    pub people_count: Option<i64>,
    pub start_time: &'a str,
    pub end_time: &'a str,
    pub manual_valuation: bool,
    pub document_count: usize,
    pub money_paid_to_personnel: bool,
}

/// Multi-factor audit-defensibility state: five independent criteria plus
/// the supporting-evidence flag feeding the valuation criterion. Recomputed
/// from scratch on every relevant field change; never stored as form state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefensibilityScore {
    pub written_notes: bool,
    pub more_people: bool,
    pub more_duration: bool,
    pub digital_valuation: bool,
    pub money_paid_to_personnel: bool,
    pub evidence_supporting: bool,
    pub score: u8,
}

impl DefensibilityScore {
    pub fn evaluate(inputs: &ScoreInputs<'_>) -> Self {
        let written_notes = !inputs.description.trim().is_empty();
        let more_people = inputs.people_count.is_some_and(|count| count >= MIN_PEOPLE);
        // Time-of-day arithmetic on a shared reference day; wraparound past
        // midnight is handled, naive string comparison is not enough here.
        let more_duration = duration_minutes(inputs.start_time, inputs.end_time)
            .is_some_and(|minutes| minutes >= MIN_DURATION_MINUTES);
        let evidence_supporting = inputs.document_count >= 1;
        let digital_valuation = !inputs.manual_valuation || evidence_supporting;
        let money_paid_to_personnel = inputs.money_paid_to_personnel;

        let score = [
            written_notes,
            more_people,
            more_duration,
            digital_valuation,
            money_paid_to_personnel,
        ]
        .iter()
        .filter(|flag| **flag)
        .count() as u8;

        Self {
            written_notes,
            more_people,
            more_duration,
            digital_valuation,
            money_paid_to_personnel,
            evidence_supporting,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DefensibilityScore, ScoreInputs};

    fn base<'a>() -> ScoreInputs<'a> {
        ScoreInputs {
            description: "",
            people_count: None,
            start_time: "",
            end_time: "",
            manual_valuation: false,
            document_count: 0,
            money_paid_to_personnel: false,
        }
    }

    #[test]
    fn empty_form_scores_one_for_automatic_valuation() {
        let score = DefensibilityScore::evaluate(&base());
        assert!(!score.written_notes);
        assert!(!score.more_people);
        assert!(!score.more_duration);
        // automatic market pricing counts as digital valuation on its own
        assert!(score.digital_valuation);
        assert!(!score.money_paid_to_personnel);
        assert_eq!(score.score, 1);
    }

    #[test]
    fn full_form_scores_five() {
        let inputs = ScoreInputs {
            description: "Quarterly strategy offsite with the sales team.",
            people_count: Some(8),
            start_time: "09:00",
            end_time: "16:00",
            manual_valuation: false,
            document_count: 2,
            money_paid_to_personnel: true,
        };
        let score = DefensibilityScore::evaluate(&inputs);
        assert_eq!(score.score, 5);
        assert!(score.evidence_supporting);
    }

    #[test]
    fn people_threshold_is_three() {
        let mut inputs = base();
        inputs.people_count = Some(2);
        assert!(!DefensibilityScore::evaluate(&inputs).more_people);
        inputs.people_count = Some(3);
        assert!(DefensibilityScore::evaluate(&inputs).more_people);
    }

    #[test]
    fn duration_threshold_with_wraparound() {
        let mut inputs = base();
        inputs.start_time = "09:00";
        inputs.end_time = "13:30"; // exactly 4.5h
        assert!(DefensibilityScore::evaluate(&inputs).more_duration);

        inputs.end_time = "13:29";
        assert!(!DefensibilityScore::evaluate(&inputs).more_duration);

        // 23:00 -> 02:00 is 3 hours, not -21
        inputs.start_time = "23:00";
        inputs.end_time = "02:00";
        assert!(!DefensibilityScore::evaluate(&inputs).more_duration);

        // 22:00 -> 03:00 is 5 hours across midnight
        inputs.start_time = "22:00";
        inputs.end_time = "03:00";
        assert!(DefensibilityScore::evaluate(&inputs).more_duration);
    }

    #[test]
    fn manual_valuation_needs_documents_for_the_valuation_criterion() {
        let mut inputs = base();
        inputs.manual_valuation = true;
        let score = DefensibilityScore::evaluate(&inputs);
        assert!(!score.digital_valuation);
        assert!(!score.evidence_supporting);

        inputs.document_count = 1;
        let score = DefensibilityScore::evaluate(&inputs);
        assert!(score.digital_valuation);
        assert!(score.evidence_supporting);
    }

    #[test]
    fn whitespace_description_does_not_count() {
        let mut inputs = base();
        inputs.description = "   \n ";
        assert!(!DefensibilityScore::evaluate(&inputs).written_notes);
        inputs.description = "x";
        assert!(DefensibilityScore::evaluate(&inputs).written_notes);
    }

    #[test]
    fn score_stays_within_bounds() {
        let score = DefensibilityScore::evaluate(&base());
        assert!(score.score <= 5);
    }
}
