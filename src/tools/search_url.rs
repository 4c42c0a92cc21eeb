//! Search URL construction.
//!
//! `<base>city=<code>[&jobType=..][&salary=..][&experience=..][&degree=..]`
//! `[&scale=..][&industry=..][&stage=..]&query=<keyword>`
//!
//! A filter is omitted when unset or set to the site's "any" value `"0"`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::core::config::{FilterValue, ScoutConfig};

/// Characters left alone by the browser's `encodeURIComponent`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_keyword(keyword: &str) -> String {
    utf8_percent_encode(keyword, QUERY_COMPONENT).to_string()
}

/// City URL without the keyword: base path, city and non-default filters.
pub fn city_search_url(cfg: &ScoutConfig, city_code: &str) -> String {
    let mut url = format!("{}city={}", cfg.site.search_url, city_code);

    let filters: [(&str, &Option<FilterValue>); 7] = [
        ("jobType", &cfg.job_type),
        ("salary", &cfg.salary),
        ("experience", &cfg.experience),
        ("degree", &cfg.degree),
        ("scale", &cfg.scale),
        ("industry", &cfg.industry),
        ("stage", &cfg.stage),
    ];
    for (name, value) in filters {
        if let Some(v) = value.as_ref().and_then(FilterValue::query_value) {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&v);
        }
    }
    url
}

/// Full listing URL for one search target.
pub fn search_url(cfg: &ScoutConfig, city_code: &str, keyword: &str) -> String {
    format!(
        "{}&query={}",
        city_search_url(cfg, city_code),
        encode_keyword(keyword)
    )
}
