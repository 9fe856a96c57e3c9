//! Append-only financial records.
//!
//! Each patient carries a [`Ledger`]. Records are immutable once appended: the ledger exposes
//! an append operation and a read-only slice, nothing else. The balance is recomputed from the
//! records on every call instead of being cached next to them.

use crate::{CareError, CareResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wardflow_types::NonEmptyText;
use wardflow_uuid::TimestampId;

/// Billable category of a financial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Admission,
    Treatment,
    Medication,
    ServiceCharge,
    Payment,
    /// Manual correction; may carry either sign.
    Adjustment,
}

impl RecordKind {
    fn check_sign(&self, amount: i64) -> CareResult<()> {
        if amount == 0 {
            return Err(CareError::Validation(
                "financial record amount cannot be zero".into(),
            ));
        }
        match self {
            RecordKind::Payment if amount > 0 => Err(CareError::Validation(
                "payments must carry a negative amount".into(),
            )),
            RecordKind::Admission
            | RecordKind::Treatment
            | RecordKind::Medication
            | RecordKind::ServiceCharge
                if amount < 0 =>
            {
                Err(CareError::Validation(
                    "charges must carry a positive amount".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl std::str::FromStr for RecordKind {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "admission" => Ok(RecordKind::Admission),
            "treatment" => Ok(RecordKind::Treatment),
            "medication" => Ok(RecordKind::Medication),
            "service_charge" => Ok(RecordKind::ServiceCharge),
            "payment" => Ok(RecordKind::Payment),
            "adjustment" => Ok(RecordKind::Adjustment),
            _ => Err(CareError::Validation(format!("unknown record kind: '{s}'"))),
        }
    }
}

/// A single charge or payment. Positive amounts are charges, negative amounts payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub id: TimestampId,
    pub kind: RecordKind,
    pub description: NonEmptyText,
    pub amount: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    records: Vec<FinancialRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and returns it. Prior records are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Validation`] for a zero amount or a sign that contradicts `kind`
    /// (payments negative, charges positive).
    pub fn append(
        &mut self,
        kind: RecordKind,
        description: NonEmptyText,
        amount: i64,
        now: DateTime<Utc>,
    ) -> CareResult<&FinancialRecord> {
        kind.check_sign(amount)?;

        let id = TimestampId::generate(self.records.last().map(|r| &r.id), now);
        self.records.push(FinancialRecord {
            id,
            kind,
            description,
            amount,
            recorded_at: now,
        });

        Ok(&self.records[self.records.len() - 1])
    }

    /// Signed sum of every record; positive means the patient owes money.
    pub fn balance(&self) -> i64 {
        self.records.iter().map(|r| r.amount).sum()
    }

    pub fn records(&self) -> &[FinancialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    #[test]
    fn balance_is_signed_sum() {
        let mut ledger = Ledger::new();
        ledger
            .append(RecordKind::Admission, text("ICU admission"), 5_000, at(0))
            .unwrap();
        ledger
            .append(RecordKind::Medication, text("Antibiotics"), 320, at(10))
            .unwrap();
        ledger
            .append(RecordKind::Payment, text("Insurance"), -4_000, at(20))
            .unwrap();

        assert_eq!(ledger.balance(), 1_320);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn appending_never_alters_prior_records() {
        let mut ledger = Ledger::new();
        ledger
            .append(RecordKind::Treatment, text("Suture"), 150, at(0))
            .unwrap();
        let before = ledger.records()[0].clone();

        ledger
            .append(RecordKind::Adjustment, text("Goodwill"), -50, at(0))
            .unwrap();

        assert_eq!(ledger.records()[0], before);
        assert!(ledger.records()[1].id.timestamp() > ledger.records()[0].id.timestamp());
    }

    #[test]
    fn rejects_zero_and_wrong_sign() {
        let mut ledger = Ledger::new();
        assert!(ledger
            .append(RecordKind::Treatment, text("Nothing"), 0, at(0))
            .is_err());
        assert!(ledger
            .append(RecordKind::Payment, text("Backwards"), 100, at(0))
            .is_err());
        assert!(ledger
            .append(RecordKind::Medication, text("Refund?"), -100, at(0))
            .is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut ledger = Ledger::new();
        ledger
            .append(RecordKind::ServiceCharge, text("Transport"), 80, at(0))
            .unwrap();

        let json = serde_json::to_value(&ledger).unwrap();
        assert!(json.is_array());
        let back: Ledger = serde_json::from_value(json).unwrap();
        assert_eq!(back, ledger);
    }

    #[test]
    fn parses_record_kind_labels() {
        assert_eq!(
            "service-charge".parse::<RecordKind>().unwrap(),
            RecordKind::ServiceCharge
        );
        assert!("refund".parse::<RecordKind>().is_err());
    }
}
