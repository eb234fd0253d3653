use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clubhouse_core::{BudgetId, DomainError, DomainResult, Entity, OrganizationId, validate};

use crate::Money;

/// Input for creating a budget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBudget {
    pub name: String,
    pub description: Option<String>,
    pub total_amount: Money,
    /// Already spent at creation; defaults to zero.
    pub spent_amount: Money,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub total_amount: Option<Money>,
    pub spent_amount: Option<Money>,
}

/// A budget.
///
/// # Invariants
/// - `total_amount > 0`.
/// - `0 <= spent_amount <= total_amount`.
///
/// Every mutator validates before writing, so a rejected call leaves the
/// budget unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub org_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    total_amount: Money,
    spent_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Budget {
    type Id = BudgetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Budget {
    pub fn create(
        id: BudgetId,
        org_id: OrganizationId,
        input: NewBudget,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = validate::required_text("name", &input.name)?;
        check_amounts(input.total_amount, input.spent_amount)?;

        Ok(Self {
            id,
            org_id,
            name,
            description: validate::optional_text(input.description.as_deref()),
            total_amount: input.total_amount,
            spent_amount: input.spent_amount,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn spent_amount(&self) -> Money {
        self.spent_amount
    }

    pub fn remaining(&self) -> Money {
        Money::from_cents(self.total_amount.cents() - self.spent_amount.cents())
    }

    pub fn update(&mut self, patch: BudgetPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let name = match &patch.name {
            Some(name) => validate::required_text("name", name)?,
            None => self.name.clone(),
        };
        let total = patch.total_amount.unwrap_or(self.total_amount);
        let spent = patch.spent_amount.unwrap_or(self.spent_amount);
        check_amounts(total, spent)?;

        self.name = name;
        if let Some(description) = patch.description.as_deref() {
            self.description = validate::optional_text(Some(description));
        }
        self.total_amount = total;
        self.spent_amount = spent;
        self.updated_at = now;
        Ok(())
    }

    pub fn add_expense(&mut self, amount: Money, now: DateTime<Utc>) -> DomainResult<Money> {
        ensure_expense(amount)?;
        let spent = self.spent_amount.checked_add(amount)?;
        if spent > self.total_amount {
            return Err(DomainError::validation(format!(
                "expense of {amount} would exceed the budget (total: {}, spent: {}, remaining: {})",
                self.total_amount,
                self.spent_amount,
                self.remaining()
            )));
        }
        self.spent_amount = spent;
        self.updated_at = now;
        Ok(spent)
    }

    pub fn remove_expense(&mut self, amount: Money, now: DateTime<Utc>) -> DomainResult<Money> {
        ensure_expense(amount)?;
        let spent = self.spent_amount.checked_sub(amount)?;
        if spent < Money::ZERO {
            return Err(DomainError::validation(format!(
                "cannot remove {amount}; only {} has been spent",
                self.spent_amount
            )));
        }
        self.spent_amount = spent;
        self.updated_at = now;
        Ok(spent)
    }
}

fn check_amounts(total: Money, spent: Money) -> DomainResult<()> {
    if !total.is_positive() {
        return Err(DomainError::validation(format!(
            "total amount must be greater than 0 (got {total})"
        )));
    }
    if spent < Money::ZERO {
        return Err(DomainError::validation(format!(
            "spent amount cannot be negative (got {spent})"
        )));
    }
    if spent > total {
        return Err(DomainError::validation(format!(
            "spent amount {spent} cannot exceed total amount {total}"
        )));
    }
    Ok(())
}

fn ensure_expense(amount: Money) -> DomainResult<()> {
    if !amount.is_positive() {
        return Err(DomainError::validation(format!(
            "expense amount must be greater than 0 (got {amount})"
        )));
    }
    Ok(())
}

/// Roll-up over an organization's budgets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAnalytics {
    pub count: usize,
    pub total: Money,
    pub spent: Money,
    pub remaining: Money,
    /// `spent / total * 100`, or 0 when there is no budget.
    pub utilization_percent: f64,
    pub budgets: Vec<Budget>,
}

impl BudgetAnalytics {
    /// Fails with Validation when the sums do not fit in [`Money`].
    pub fn from_budgets(budgets: Vec<Budget>) -> DomainResult<Self> {
        let mut total = Money::ZERO;
        let mut spent = Money::ZERO;
        for b in &budgets {
            total = total.checked_add(b.total_amount)?;
            spent = spent.checked_add(b.spent_amount)?;
        }
        let utilization_percent = if total.is_positive() {
            spent.cents() as f64 / total.cents() as f64 * 100.0
        } else {
            0.0
        };

        Ok(Self {
            count: budgets.len(),
            total,
            spent,
            remaining: total.checked_sub(spent)?,
            utilization_percent,
            budgets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn budget(total: i64, spent: i64) -> Budget {
        Budget::create(
            BudgetId::new(),
            OrganizationId::new(),
            NewBudget {
                name: "Season".to_string(),
                description: None,
                total_amount: Money::from_cents(total),
                spent_amount: Money::from_cents(spent),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn overspending_is_rejected_and_state_kept() {
        let mut b = budget(100, 80);
        let err = b.add_expense(Money::from_cents(30), Utc::now()).unwrap_err();
        match err {
            DomainError::Validation(msg) => {
                assert!(msg.contains("0.30"), "{msg}");
                assert!(msg.contains("0.80"), "{msg}");
                assert!(msg.contains("1.00"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(b.spent_amount(), Money::from_cents(80));
    }

    #[test]
    fn expense_up_to_total_is_accepted() {
        let mut b = budget(100, 80);
        assert_eq!(b.add_expense(Money::from_cents(20), Utc::now()).unwrap(), Money::from_cents(100));
        assert_eq!(b.remaining(), Money::ZERO);
    }

    #[test]
    fn removing_more_than_spent_is_rejected() {
        let mut b = budget(100, 10);
        assert!(b.remove_expense(Money::from_cents(11), Utc::now()).is_err());
        assert_eq!(b.remove_expense(Money::from_cents(10), Utc::now()).unwrap(), Money::ZERO);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut b = budget(100, 0);
        assert!(b.add_expense(Money::ZERO, Utc::now()).is_err());
        assert!(b.remove_expense(Money::from_cents(-5), Utc::now()).is_err());
        assert!(
            Budget::create(BudgetId::new(), OrganizationId::new(), NewBudget {
                name: "Empty".to_string(),
                ..Default::default()
            }, Utc::now())
            .is_err()
        );
    }

    #[test]
    fn update_cannot_drop_total_below_spent() {
        let mut b = budget(100, 80);
        let err = b
            .update(
                BudgetPatch {
                    total_amount: Some(Money::from_cents(50)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(b.total_amount(), Money::from_cents(100));

        b.update(
            BudgetPatch {
                name: Some("Spring".to_string()),
                total_amount: Some(Money::from_cents(200)),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(b.name, "Spring");
        assert_eq!(b.remaining(), Money::from_cents(120));
    }

    #[test]
    fn analytics_rolls_up() {
        let a = BudgetAnalytics::from_budgets(vec![budget(100, 25), budget(300, 75)]).unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(a.total, Money::from_cents(400));
        assert_eq!(a.spent, Money::from_cents(100));
        assert_eq!(a.remaining, Money::from_cents(300));
        assert!((a.utilization_percent - 25.0).abs() < f64::EPSILON);

        assert_eq!(BudgetAnalytics::from_budgets(vec![]).unwrap().utilization_percent, 0.0);
    }

    #[test]
    fn analytics_rejects_totals_beyond_money_range() {
        let half = i64::MAX / 2 + 1;
        let err = BudgetAnalytics::from_budgets(vec![budget(half, 0), budget(half, 0)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let a = BudgetAnalytics::from_budgets(vec![budget(half - 1, 10), budget(half, 10)]).unwrap();
        assert_eq!(a.total, Money::from_cents(i64::MAX));
        assert_eq!(a.remaining, Money::from_cents(i64::MAX - 20));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of expense additions and removals,
        /// `0 <= spent <= total` holds after every step, and rejected steps
        /// leave the budget as it was.
        #[test]
        fn spent_stays_within_bounds(
            total in 1i64..1_000_000,
            ops in prop::collection::vec((any::<bool>(), -1_000i64..200_000), 1..50)
        ) {
            let mut b = budget(total, 0);
            for (add, cents) in ops {
                let before = b.clone();
                let amount = Money::from_cents(cents);
                let result = if add {
                    b.add_expense(amount, Utc::now())
                } else {
                    b.remove_expense(amount, Utc::now())
                };
                if result.is_err() {
                    prop_assert_eq!(&b, &before);
                }
                prop_assert!(b.spent_amount() >= Money::ZERO);
                prop_assert!(b.spent_amount() <= b.total_amount());
            }
        }
    }
}
