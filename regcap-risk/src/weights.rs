//! Standardized approach risk weights
//!
//! Rating buckets are implied from PD:
//!
//! | bucket        | PD upper bound |
//! |---------------|----------------|
//! | AAA           | 0.0001         |
//! | AA            | 0.0003         |
//! | A             | 0.001          |
//! | BBB           | 0.005          |
//! | BB            | 0.02           |
//! | B             | 0.15           |
//! | CCC-or-below  | > 0.15         |

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::fields::AssetClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatingBucket {
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "BBB")]
    Bbb,
    #[serde(rename = "BB")]
    Bb,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "CCC_OR_BELOW")]
    CccOrBelow,
}

impl RatingBucket {
    pub fn from_pd(pd: f64) -> Self {
        if pd <= 0.0001 {
            RatingBucket::Aaa
        } else if pd <= 0.0003 {
            RatingBucket::Aa
        } else if pd <= 0.001 {
            RatingBucket::A
        } else if pd <= 0.005 {
            RatingBucket::Bbb
        } else if pd <= 0.02 {
            RatingBucket::Bb
        } else if pd <= 0.15 {
            RatingBucket::B
        } else {
            RatingBucket::CccOrBelow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RatingBucket::Aaa => "AAA",
            RatingBucket::Aa => "AA",
            RatingBucket::A => "A",
            RatingBucket::Bbb => "BBB",
            RatingBucket::Bb => "BB",
            RatingBucket::B => "B",
            RatingBucket::CccOrBelow => "CCC_OR_BELOW",
        }
    }
}

/// Risk weight for `(asset_class, bucket)` as a fraction of exposure
pub fn standardized_risk_weight(asset_class: AssetClass, bucket: RatingBucket) -> Decimal {
    use RatingBucket::*;

    match asset_class {
        AssetClass::Sovereign => match bucket {
            Aaa | Aa => dec!(0.00),
            A => dec!(0.20),
            Bbb => dec!(0.50),
            Bb | B => dec!(1.00),
            CccOrBelow => dec!(1.50),
        },
        AssetClass::Bank => match bucket {
            Aaa | Aa => dec!(0.20),
            A | Bbb => dec!(0.50),
            Bb | B => dec!(1.00),
            CccOrBelow => dec!(1.50),
        },
        AssetClass::Corporate => match bucket {
            Aaa | Aa => dec!(0.20),
            A => dec!(0.50),
            Bbb => dec!(0.75),
            Bb => dec!(1.00),
            B | CccOrBelow => dec!(1.50),
        },
        AssetClass::Retail => dec!(0.75),
        AssetClass::ResidentialMortgage => dec!(0.35),
        AssetClass::CommercialRealEstate => dec!(1.00),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_thresholds() {
        assert_eq!(RatingBucket::from_pd(0.0001), RatingBucket::Aaa);
        assert_eq!(RatingBucket::from_pd(0.00011), RatingBucket::Aa);
        assert_eq!(RatingBucket::from_pd(0.001), RatingBucket::A);
        assert_eq!(RatingBucket::from_pd(0.01), RatingBucket::Bb);
        assert_eq!(RatingBucket::from_pd(0.15), RatingBucket::B);
        assert_eq!(RatingBucket::from_pd(0.1500001), RatingBucket::CccOrBelow);
    }

    #[test]
    fn test_weights_worsen_with_rating() {
        for class in [AssetClass::Sovereign, AssetClass::Bank, AssetClass::Corporate] {
            let mut prev = Decimal::ZERO;
            for bucket in [
                RatingBucket::Aaa,
                RatingBucket::Aa,
                RatingBucket::A,
                RatingBucket::Bbb,
                RatingBucket::Bb,
                RatingBucket::B,
                RatingBucket::CccOrBelow,
            ] {
                let w = standardized_risk_weight(class, bucket);
                assert!(w >= prev, "{:?} {:?}", class, bucket);
                prev = w;
            }
        }
    }

    #[test]
    fn test_flat_retail_weights() {
        assert_eq!(
            standardized_risk_weight(AssetClass::Retail, RatingBucket::CccOrBelow),
            dec!(0.75)
        );
        assert_eq!(
            standardized_risk_weight(AssetClass::ResidentialMortgage, RatingBucket::Aaa),
            dec!(0.35)
        );
    }
}
