use serde::{Deserialize, Serialize};

use crate::services::calendar::DateRange;
use crate::services::defensibility::{DefensibilityScore, ScoreInputs};
use crate::services::pricing::PricingDay;
use crate::services::valuation::{
    apply_daily_rate, reconcile, DailyAmount, PropertyPlan, ValuationWarning,
};

/// What the user is doing with the form when it is submitted. Draft and
/// template saves skip strict validation; book and update do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Book,
    Update,
    Draft,
    Template,
}

impl EventAction {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "book" => Some(Self::Book),
            "update" => Some(Self::Update),
            "draft" => Some(Self::Draft),
            "template" => Some(Self::Template),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Update => "update",
            Self::Draft => "draft",
            Self::Template => "template",
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, Self::Book | Self::Update)
    }
}

/// Immutable working form state. Mutated exclusively through
/// [`EventDraft::apply`], which re-derives dependent fields (date range →
/// daily amounts → rental amount) on every action, so derived values can
/// never go stale behind a hidden dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub current_action: EventAction,
    pub title: String,
    pub description: String,
    pub range: Option<DateRange>,
    pub start_time: String,
    pub end_time: String,
    pub people_count: Option<i64>,
    pub excluded_areas: String,
    pub manual_valuation: bool,
    pub daily_rate: Option<f64>,
    pub rental_amount: f64,
    pub daily_amounts: Vec<DailyAmount>,
    pub money_paid_to_personnel: bool,
    pub persisted_document_count: usize,
    pub pending_upload_count: usize,
    pub warning: Option<ValuationWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftChange {
    SetAction(EventAction),
    SetTitle(String),
    SetDescription(String),
    SetDateRange(Option<DateRange>),
    SetTimes { start: String, end: String },
    SetPeopleCount(Option<i64>),
    SetExcludedAreas(String),
    SetManualValuation(bool),
    SetDailyRate(Option<f64>),
    SetMoneyPaidToPersonnel(bool),
    SetDocumentCounts { persisted: usize, pending: usize },
}

impl EventDraft {
    pub fn new(action: EventAction) -> Self {
        Self {
            current_action: action,
            title: String::new(),
            description: String::new(),
            range: None,
            start_time: String::new(),
            end_time: String::new(),
            people_count: None,
            excluded_areas: String::new(),
            manual_valuation: false,
            daily_rate: None,
            rental_amount: 0.0,
            daily_amounts: Vec::new(),
            money_paid_to_personnel: false,
            persisted_document_count: 0,
            pending_upload_count: 0,
            warning: None,
        }
    }

    /// Pure reducer: returns the next draft, leaving `self` untouched.
    /// Valuation re-derivation runs only for the changes that affect it.
    pub fn apply(
        &self,
        change: DraftChange,
        plan: &PropertyPlan,
        pricing: &[PricingDay],
    ) -> EventDraft {
        let mut next = self.clone();
        next.warning = None;
        match change {
            DraftChange::SetAction(action) => next.current_action = action,
            DraftChange::SetTitle(title) => next.title = title,
            DraftChange::SetDescription(description) => next.description = description,
            DraftChange::SetDateRange(range) => {
                next.range = range;
                next.reconcile_amounts(plan, pricing);
            }
            DraftChange::SetTimes { start, end } => {
                next.start_time = start;
                next.end_time = end;
            }
            DraftChange::SetPeopleCount(count) => next.people_count = count,
            DraftChange::SetExcludedAreas(areas) => next.excluded_areas = areas,
            DraftChange::SetManualValuation(manual) => {
                next.manual_valuation = manual;
                next.reconcile_amounts(plan, pricing);
            }
            DraftChange::SetDailyRate(rate) => {
                next.daily_rate = rate;
                next.apply_rate_change();
            }
            DraftChange::SetMoneyPaidToPersonnel(paid) => next.money_paid_to_personnel = paid,
            DraftChange::SetDocumentCounts { persisted, pending } => {
                next.persisted_document_count = persisted;
                next.pending_upload_count = pending;
            }
        }
        next
    }

    /// Defensibility is a selector over the current draft, never stored.
    pub fn defensibility(&self) -> DefensibilityScore {
        DefensibilityScore::evaluate(&ScoreInputs {
            description: &self.description,
            people_count: self.people_count,
            start_time: &self.start_time,
            end_time: &self.end_time,
            manual_valuation: self.manual_valuation,
            document_count: self.persisted_document_count + self.pending_upload_count,
            money_paid_to_personnel: self.money_paid_to_personnel,
        })
    }

    pub fn document_count(&self) -> usize {
        self.persisted_document_count + self.pending_upload_count
    }

    fn reconcile_amounts(&mut self, plan: &PropertyPlan, pricing: &[PricingDay]) {
        let Some(range) = self.range else {
            self.rental_amount = 0.0;
            self.daily_amounts = Vec::new();
            return;
        };
        let result = reconcile(
            range,
            plan,
            pricing,
            self.manual_valuation,
            self.daily_rate,
        );
        self.manual_valuation = result.manual_valuation;
        self.rental_amount = result.rental_amount;
        self.daily_amounts = result.daily_amounts;
        self.warning = result.warning;
    }

    fn apply_rate_change(&mut self) {
        // Rate edits only drive amounts in manual mode; otherwise the raw
        // rate is kept for a later switch to manual and the custom-plan or
        // market day lines stay untouched.
        if !self.manual_valuation {
            return;
        }
        let Some(rate) = self.daily_rate else {
            return;
        };
        // Without fixed dates the raw rate is kept for later and the day
        // lines are left alone.
        if let Some(result) = apply_daily_rate(rate, self.range) {
            self.rental_amount = result.rental_amount;
            self.daily_amounts = result.daily_amounts;
        }
    }
}
