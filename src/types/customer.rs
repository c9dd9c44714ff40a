//! Customer data structures for mortgage churn prediction

use crate::error::InputError;
use crate::types::record::{FieldValue, Record};
use serde::{Deserialize, Serialize};

/// Customer geography
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Geography {
    France,
    Spain,
    Germany,
}

impl Geography {
    pub fn as_str(&self) -> &'static str {
        match self {
            Geography::France => "France",
            Geography::Spain => "Spain",
            Geography::Germany => "Germany",
        }
    }
}

/// Customer gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

/// Customer attributes submitted for a churn prediction.
///
/// Field names serialize with the spelling used at training time
/// (`Geography`, `Gender`, `Age`); lowercase aliases are accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Credit score (300-850)
    pub credit_score: f64,

    #[serde(rename = "Geography", alias = "geography")]
    pub geography: Geography,

    #[serde(rename = "Gender", alias = "gender")]
    pub gender: Gender,

    /// Age in years (18-100)
    #[serde(rename = "Age", alias = "age")]
    pub age: u32,

    /// Loan age in years (0-50)
    pub loan_age_years: f64,

    pub outstanding_loan_balance: f64,

    /// Number of bank products held (1-4)
    pub num_bank_products: u32,

    /// 0 or 1
    pub has_credit_card: u8,

    /// 0 or 1
    pub online_banking_active: u8,

    pub annual_income: f64,

    #[serde(default)]
    pub monthly_income: Option<f64>,

    #[serde(default)]
    pub estimated_property_value: Option<f64>,

    /// Loan-to-value ratio
    #[serde(default)]
    pub ltv_ratio: Option<f64>,

    #[serde(default)]
    pub payment_to_income_ratio: Option<f64>,

    /// Composite risk score
    #[serde(default)]
    pub risk_score: Option<f64>,

    #[serde(default)]
    pub balance_per_product: Option<f64>,
}

/// Ratio of estimated property value to annual income used when the caller omits it.
const PROPERTY_VALUE_INCOME_MULTIPLE: f64 = 3.5;

impl CustomerRecord {
    /// Create a record with the required fields and no derived fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credit_score: f64,
        geography: Geography,
        gender: Gender,
        age: u32,
        loan_age_years: f64,
        outstanding_loan_balance: f64,
        num_bank_products: u32,
        has_credit_card: u8,
        online_banking_active: u8,
        annual_income: f64,
    ) -> Self {
        Self {
            credit_score,
            geography,
            gender,
            age,
            loan_age_years,
            outstanding_loan_balance,
            num_bank_products,
            has_credit_card,
            online_banking_active,
            annual_income,
            monthly_income: None,
            estimated_property_value: None,
            ltv_ratio: None,
            payment_to_income_ratio: None,
            risk_score: None,
            balance_per_product: None,
        }
    }

    /// Check numeric ranges. Enumerations are already enforced by the types.
    pub fn validate(&self) -> Result<(), InputError> {
        check_range("credit_score", self.credit_score, 300.0, 850.0)?;
        check_range("Age", self.age as f64, 18.0, 100.0)?;
        check_range("loan_age_years", self.loan_age_years, 0.0, 50.0)?;
        check_range(
            "outstanding_loan_balance",
            self.outstanding_loan_balance,
            0.0,
            1e7,
        )?;
        check_range("num_bank_products", self.num_bank_products as f64, 1.0, 4.0)?;
        check_range("has_credit_card", self.has_credit_card as f64, 0.0, 1.0)?;
        check_range(
            "online_banking_active",
            self.online_banking_active as f64,
            0.0,
            1.0,
        )?;
        check_range("annual_income", self.annual_income, 0.0, 1e7)?;

        let optional = [
            ("monthly_income", self.monthly_income, 1e6),
            ("estimated_property_value", self.estimated_property_value, 1e8),
            ("ltv_ratio", self.ltv_ratio, 2.0),
            ("payment_to_income_ratio", self.payment_to_income_ratio, 2.0),
            ("risk_score", self.risk_score, 2.0),
            ("balance_per_product", self.balance_per_product, 1e7),
        ];
        for (field, value, max) in optional {
            if let Some(v) = value {
                check_range(field, v, 0.0, max)?;
            }
        }
        Ok(())
    }

    /// Fill absent derived fields: monthly income from annual income, property value as
    /// a multiple of annual income, and the remaining ratios as zero.
    pub fn with_derived_defaults(mut self) -> Self {
        let annual = self.annual_income;
        self.monthly_income.get_or_insert(annual / 12.0);
        self.estimated_property_value
            .get_or_insert(annual * PROPERTY_VALUE_INCOME_MULTIPLE);
        self.ltv_ratio.get_or_insert(0.0);
        self.payment_to_income_ratio.get_or_insert(0.0);
        self.risk_score.get_or_insert(0.0);
        self.balance_per_product.get_or_insert(0.0);
        self
    }

    /// Convert to an untyped record in training column order. Absent optional
    /// fields are omitted so reconciliation can backfill them.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with_number("credit_score", self.credit_score)
            .with_text("Geography", self.geography.as_str())
            .with_text("Gender", self.gender.as_str())
            .with_number("Age", self.age as f64)
            .with_number("loan_age_years", self.loan_age_years)
            .with_number("outstanding_loan_balance", self.outstanding_loan_balance)
            .with_number("num_bank_products", self.num_bank_products as f64)
            .with_number("has_credit_card", self.has_credit_card as f64)
            .with_number("online_banking_active", self.online_banking_active as f64)
            .with_number("annual_income", self.annual_income);

        let optional = [
            ("monthly_income", self.monthly_income),
            ("estimated_property_value", self.estimated_property_value),
            ("ltv_ratio", self.ltv_ratio),
            ("payment_to_income_ratio", self.payment_to_income_ratio),
            ("risk_score", self.risk_score),
            ("balance_per_product", self.balance_per_product),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                record.insert(name, FieldValue::Number(v));
            }
        }
        record
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), InputError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(InputError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_customer;

    #[test]
    fn test_customer_deserialization_accepts_aliases() {
        let json = r#"{
            "credit_score": 650, "geography": "Germany", "Gender": "Male", "age": 35,
            "loan_age_years": 5, "outstanding_loan_balance": 50000.0, "num_bank_products": 2,
            "has_credit_card": 1, "online_banking_active": 0, "annual_income": 85000.0,
            "risk_score": 0.25
        }"#;
        let customer: CustomerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(customer.geography, Geography::Germany);
        assert_eq!(customer.gender, Gender::Male);
        assert_eq!(customer.age, 35);
        assert_eq!(customer.risk_score, Some(0.25));
        assert_eq!(customer.monthly_income, None);
    }

    #[test]
    fn test_unknown_geography_rejected() {
        let json = r#"{
            "credit_score": 650, "Geography": "Italy", "Gender": "Male", "Age": 35,
            "loan_age_years": 5, "outstanding_loan_balance": 0, "num_bank_products": 2,
            "has_credit_card": 1, "online_banking_active": 0, "annual_income": 85000.0
        }"#;
        assert!(serde_json::from_str::<CustomerRecord>(json).is_err());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(sample_customer().validate().is_ok());

        let mut young = sample_customer();
        young.age = 17;
        assert!(matches!(
            young.validate(),
            Err(InputError::OutOfRange { ref field, .. }) if field == "Age"
        ));

        let mut ratio = sample_customer();
        ratio.ltv_ratio = Some(2.5);
        assert!(ratio.validate().is_err());
    }

    #[test]
    fn test_derived_defaults() {
        let customer = sample_customer().with_derived_defaults();
        assert!((customer.monthly_income.unwrap() - 8445.74).abs() < 0.01);
        assert!((customer.estimated_property_value.unwrap() - 354721.08).abs() < 0.01);
        assert_eq!(customer.risk_score, Some(0.0));

        let mut given = sample_customer();
        given.risk_score = Some(0.168);
        assert_eq!(given.with_derived_defaults().risk_score, Some(0.168));
    }

    #[test]
    fn test_to_record_omits_absent_optionals() {
        let record = sample_customer().to_record();
        assert_eq!(record.len(), 10);
        assert_eq!(record.get("Geography"), Some(&FieldValue::Text("France".into())));
        assert!(record.get("risk_score").is_none());

        let full = sample_customer().with_derived_defaults().to_record();
        assert_eq!(full.len(), 16);
    }
}
