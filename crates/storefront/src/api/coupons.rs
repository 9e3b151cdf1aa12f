//! Coupon validation.

use reqwest::Method;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::api::types::{CouponValidation, ValidateCouponRequest};
use crate::api::{ApiClient, ApiError};

impl ApiClient {
    /// Ask the coupon service whether `code` applies to a cart worth `subtotal`.
    ///
    /// A `404` or a business-rule rejection is reported as an invalid coupon
    /// carrying the backend's message, not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport, server or decoding failures.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn validate_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<CouponValidation, ApiError> {
        let request = ValidateCouponRequest { code, subtotal };

        match self
            .send::<_, CouponValidation>(Method::POST, "coupons/validate", Some(&request), None)
            .await
        {
            Ok(validation) => Ok(validation),
            Err(ApiError::NotFound(message) | ApiError::Rejected(message)) => {
                Ok(CouponValidation {
                    valid: false,
                    code: Some(code.to_string()),
                    discount_percent: None,
                    message: Some(message),
                })
            }
            Err(e) => Err(e),
        }
    }
}
