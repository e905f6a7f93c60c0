//! External protocol constants for the portal.
//!
//! The portal has no official API; everything here was observed from its
//! web application and can move under the portal operators' feet. Keeping
//! every URL, selector and wire constant in one module means a portal UI
//! change is a one-file fix.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};

/// Portal landing page, the entry point of the login flow.
pub const PORTAL_ROOT_URL: &str = "https://www.einvoice.nat.gov.tw/";

/// Base URL of the portal's JSON service endpoints.
pub const SERVICE_BASE_URL: &str = "https://service-mc.einvoice.nat.gov.tw";

/// Carrier list endpoint.
pub const CARRIER_LIST_PATH: &str = "/btc/cloud/api/btc502w/getCarrierList";

/// Search-token mint endpoint; the response body is the bare token.
pub const SEARCH_TOKEN_PATH: &str = "/btc/cloud/api/btc502w/getSearchCarrierInvoiceListJWT";

/// Paginated carrier invoice search endpoint.
pub const SEARCH_INVOICE_PATH: &str = "/btc/cloud/api/btc502w/searchCarrierInvoice";

/// Invoice data endpoint; takes the bare search token as its body.
pub const INVOICE_DATA_PATH: &str = "/btc/cloud/api/common/getCarrierInvoiceData";

/// Paginated invoice detail endpoint; same bare-token body convention.
pub const INVOICE_DETAIL_PATH: &str = "/btc/cloud/api/common/getCarrierInvoiceDetail";

/// Login link on the landing page. Only present in the desktop layout.
pub const LOGIN_LINK_SELECTOR: &str = r#"a[title="登入"]"#;

/// Mobile number field on the login form.
pub const MOBILE_FIELD_SELECTOR: &str = "#mobile_phone";

/// Password field on the login form.
pub const PASSWORD_FIELD_SELECTOR: &str = "#password";

/// The rendered CAPTCHA widget; screenshotted for OCR.
pub const CAPTCHA_IMAGE_SELECTOR: &str = ".input-group-text.code_num";

/// CAPTCHA answer field.
pub const CAPTCHA_FIELD_SELECTOR: &str = "#captcha";

/// Login form submit button.
pub const SUBMIT_BUTTON_SELECTOR: &str = "#submitBtn";

/// Control that re-renders a fresh CAPTCHA image.
pub const CAPTCHA_REFRESH_SELECTOR: &str = ".btn.btn-outline-secondary.icon";

/// Session storage key the portal writes the bearer token under after a
/// successful login.
pub const TOKEN_STORAGE_KEY: &str = "saveToken";

/// The portal's CAPTCHA images only ever contain digits.
pub const CAPTCHA_ALLOWLIST: &str = "0123456789";

/// Fixed time of day carried by both bounds of a search range. The portal
/// backend rejects requests with arbitrary timestamps.
pub const SEARCH_BOUND_TIME: (u32, u32, u32, u32) = (15, 5, 23, 222);

/// Wire format for search range bounds.
const SEARCH_BOUND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Replace a search bound's time of day with the portal's fixed component.
#[must_use]
pub fn normalize_search_bound(bound: DateTime<Utc>) -> DateTime<Utc> {
    let (hour, minute, second, milli) = SEARCH_BOUND_TIME;
    let time =
        NaiveTime::from_hms_milli_opt(hour, minute, second, milli).expect("valid fixed time of day");
    Utc.from_utc_datetime(&bound.date_naive().and_time(time))
}

/// Normalize a search bound and render it in the portal's wire format.
#[must_use]
pub fn format_search_bound(bound: DateTime<Utc>) -> String {
    normalize_search_bound(bound)
        .format(SEARCH_BOUND_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_overrides_time_of_day() {
        let input = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).single().expect("valid date");
        let normalized = normalize_search_bound(input);

        assert_eq!(normalized.date_naive(), input.date_naive());
        assert_eq!(format_search_bound(input), "2024-03-14T15:05:23.222Z");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let input = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date");
        let once = normalize_search_bound(input);
        let twice = normalize_search_bound(once);
        assert_eq!(once, twice);
    }
}
