//! A blocking client for the Elektrum self-service portal's consumption
//! graphs. The portal has no API: this client drives the website itself,
//! logging in through the portal's form when a request is answered with the
//! login challenge, and reading the meter data the page embeds in an HTML
//! attribute.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::redirect;
use tracing::debug;

pub mod error;
mod page;
pub mod query;
pub mod series;

use error::PortalError;
use query::QuerySpec;
use series::FetchResult;

const BASE_HOST: &str = "https://www.e-st.lv";
const LOGIN_PATH: &str = "/lv/private/user-authentification/";
const DATA_PATH: &str = "/lv/private/paterini-un-norekini/paterinu-grafiki/";

/// The portal rejects clients it does not recognize as browsers.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/97.0.4692.71 Safari/537.36";

/// The seam between the fetch pipeline and the HTTP layer. The portal client
/// implements it with its cookie-carrying blocking session; tests implement
/// it with canned pages.
pub trait PortalHttp {
    fn http_get(&self, url: &str, query: &[(String, String)]) -> Result<String, PortalError>;

    fn http_post_form(&self, url: &str, form: &[(String, String)]) -> Result<String, PortalError>;
}

/// An authenticated session against the Elektrum portal for one meter.
///
/// The session cookies live in the underlying HTTP client and persist across
/// fetches, so at most the first fetch per session pays for the login
/// round-trip. The cookie jar is not synchronized: share a portal instance
/// between threads only behind a lock, or give each worker its own.
#[derive(Debug)]
pub struct ElektrumPortal {
    login: String,
    password: String,
    meter_id: String,
    base_host: String,

    client: reqwest::blocking::Client,
}

impl ElektrumPortal {
    pub fn new(login: String, password: String, meter_id: String) -> Self {
        ElektrumPortal {
            login,
            password,
            meter_id,
            base_host: BASE_HOST.to_string(),
            client: Self::http_client(BASE_HOST),
        }
    }

    pub fn from_env_values() -> Self {
        let login = std::env::var("ELEKTRUM_LOGIN").expect("ELEKTRUM_LOGIN must be set");
        let password = std::env::var("ELEKTRUM_PASSWORD").expect("ELEKTRUM_PASSWORD must be set");
        let meter_id = std::env::var("ELEKTRUM_METER_ID").expect("ELEKTRUM_METER_ID must be set");

        ElektrumPortal::new(login, password, meter_id)
    }

    pub fn with_base_host(mut self, base_host: String) -> Self {
        self.client = Self::http_client(&base_host);
        self.base_host = base_host;
        self
    }

    fn http_client(base_host: &str) -> reqwest::blocking::Client {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            REFERER,
            HeaderValue::from_str(base_host).expect("base host is not a valid Referer"),
        );

        reqwest::blocking::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .redirect(redirect::Policy::limited(3))
            .build()
            .expect("failed to build HTTP client")
    }

    /// Readings for a single day at hourly resolution. Omitted date parts
    /// default to yesterday's.
    pub fn fetch_day(
        &self,
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
    ) -> Result<FetchResult, PortalError> {
        self.fetch_custom(&QuerySpec {
            period: query::Period::Day,
            year,
            month,
            day,
            granularity: Some(query::Granularity::Hour),
        })
    }

    /// Readings for a calendar month; `granularity` defaults to daily.
    pub fn fetch_month(
        &self,
        year: Option<i32>,
        month: Option<u32>,
        granularity: Option<query::Granularity>,
    ) -> Result<FetchResult, PortalError> {
        self.fetch_custom(&QuerySpec {
            period: query::Period::Month,
            year,
            month,
            day: None,
            granularity: Some(granularity.unwrap_or(query::Granularity::Day)),
        })
    }

    /// Readings for a full year, one point per month.
    pub fn fetch_year(&self, year: Option<i32>) -> Result<FetchResult, PortalError> {
        self.fetch_custom(&QuerySpec {
            period: query::Period::Year,
            year,
            ..QuerySpec::default()
        })
    }

    pub fn fetch_custom(&self, spec: &QuerySpec) -> Result<FetchResult, PortalError> {
        self.fetch_via(self, spec)
    }

    /// The whole fetch pipeline: request the data page, log in if the portal
    /// answered with its login challenge instead, then pull the readings out
    /// of the chart element.
    fn fetch_via(
        &self,
        http: &dyn PortalHttp,
        spec: &QuerySpec,
    ) -> Result<FetchResult, PortalError> {
        let url = format!("{}{}", self.base_host, DATA_PATH);
        let query = spec.to_query_pairs(&self.meter_id, query::yesterday());

        let mut body = http.http_get(&url, &query)?;

        if page::has_login_form(&body)? {
            debug!("login challenge received, authenticating");
            let form = page::login_form(&body, &self.login, &self.password)?;
            let login_url = format!("{}{}", self.base_host, LOGIN_PATH);
            // The login response is the originally requested data page,
            // rendered for the now-authenticated session.
            body = http.http_post_form(&login_url, &form)?;
        }

        let payload = page::chart_payload(&body)?;
        Ok(FetchResult::from_payload(&payload))
    }
}

impl PortalHttp for ElektrumPortal {
    fn http_get(&self, url: &str, query: &[(String, String)]) -> Result<String, PortalError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| PortalError::transport(url, e))?;

        response.text().map_err(|e| PortalError::transport(url, e))
    }

    fn http_post_form(&self, url: &str, form: &[(String, String)]) -> Result<String, PortalError> {
        debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .map_err(|e| PortalError::transport(url, e))?;

        response.text().map_err(|e| PortalError::transport(url, e))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    const DATA_PAGE: &str = r#"<html><body>
        <div class="chart" data-values='{"values":{"A+":{"total":{"data":[{"timestamp":"2024-03-05T00:00:00","value":1.23}]}},"A-":{"total":{"data":[]}}}}'></div>
        </body></html>"#;

    const LOGIN_PAGE: &str = r#"<html><body>
        <form class="authenticate" method="post">
            <input type="hidden" name="_token" value="T1">
            <input type="hidden" name="returnUrl" value="/x">
        </form>
        </body></html>"#;

    #[derive(Debug, PartialEq)]
    enum Request {
        Get {
            url: String,
            query: Vec<(String, String)>,
        },
        Post {
            url: String,
            form: Vec<(String, String)>,
        },
    }

    /// Serves queued response bodies and records every request.
    struct FakePortal {
        responses: RefCell<Vec<String>>,
        requests: RefCell<Vec<Request>>,
    }

    impl FakePortal {
        fn serving(pages: &[&str]) -> Self {
            FakePortal {
                responses: RefCell::new(pages.iter().map(|p| p.to_string()).collect()),
                requests: RefCell::new(vec![]),
            }
        }

        fn next_response(&self) -> String {
            self.responses.borrow_mut().remove(0)
        }
    }

    impl PortalHttp for FakePortal {
        fn http_get(&self, url: &str, query: &[(String, String)]) -> Result<String, PortalError> {
            self.requests.borrow_mut().push(Request::Get {
                url: url.to_string(),
                query: query.to_vec(),
            });
            Ok(self.next_response())
        }

        fn http_post_form(
            &self,
            url: &str,
            form: &[(String, String)],
        ) -> Result<String, PortalError> {
            self.requests.borrow_mut().push(Request::Post {
                url: url.to_string(),
                form: form.to_vec(),
            });
            Ok(self.next_response())
        }
    }

    fn portal() -> ElektrumPortal {
        ElektrumPortal::new(
            "user@example.com".to_string(),
            "hunter2".to_string(),
            "123".to_string(),
        )
    }

    #[test]
    fn authenticated_session_fetches_without_a_login_roundtrip() {
        let portal = portal();
        let fake = FakePortal::serving(&[DATA_PAGE]);

        let result = portal.fetch_via(&fake, &QuerySpec::default()).unwrap();

        assert_eq!(result.consumed.len(), 1);
        assert_eq!(result.consumed[0].timestamp, "2024-03-05T00:00:00");
        assert!(result.returned.is_empty());

        let requests = fake.requests.borrow();
        assert_eq!(requests.len(), 1);
        match &requests[0] {
            Request::Get { url, query } => {
                assert_eq!(url, &format!("{}{}", BASE_HOST, DATA_PATH));
                assert!(query.contains(&("counterNumber".to_string(), "123".to_string())));
                assert!(query.contains(&("period".to_string(), "D".to_string())));
            }
            other => panic!("expected a GET, got {:?}", other),
        }
    }

    #[test]
    fn login_challenge_triggers_the_handshake() {
        let portal = portal();
        let fake = FakePortal::serving(&[LOGIN_PAGE, DATA_PAGE]);

        let result = portal.fetch_via(&fake, &QuerySpec::default()).unwrap();
        assert_eq!(result.consumed.len(), 1);

        let requests = fake.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1],
            Request::Post {
                url: format!("{}{}", BASE_HOST, LOGIN_PATH),
                form: vec![
                    ("_token".to_string(), "T1".to_string()),
                    ("returnUrl".to_string(), "/x".to_string()),
                    ("login".to_string(), "user@example.com".to_string()),
                    ("password".to_string(), "hunter2".to_string()),
                ],
            }
        );
    }

    #[test]
    fn rejected_login_surfaces_at_chart_extraction() {
        let portal = portal();
        // The POST answers with the login page again, which has no chart.
        let fake = FakePortal::serving(&[LOGIN_PAGE, LOGIN_PAGE]);

        let err = portal.fetch_via(&fake, &QuerySpec::default()).unwrap_err();
        assert!(matches!(err, PortalError::Extraction { .. }));
    }

    #[test]
    fn login_page_without_hidden_fields_is_an_extraction_error() {
        let portal = portal();
        let fake = FakePortal::serving(&[r#"<form class="authenticate"></form>"#]);

        let err = portal.fetch_via(&fake, &QuerySpec::default()).unwrap_err();
        assert!(matches!(err, PortalError::Extraction { .. }));
    }

    #[test]
    fn second_fetch_reuses_the_session() {
        let portal = portal();
        let fake = FakePortal::serving(&[LOGIN_PAGE, DATA_PAGE, DATA_PAGE]);

        portal.fetch_via(&fake, &QuerySpec::default()).unwrap();
        portal.fetch_via(&fake, &QuerySpec::default()).unwrap();

        // One login for the whole session: the second fetch is a plain GET.
        let requests = fake.requests.borrow();
        assert_eq!(requests.len(), 3);
        assert!(matches!(requests[2], Request::Get { .. }));
    }

    #[test]
    fn year_fetch_query_omits_date_and_granularity() {
        let portal = portal();
        let fake = FakePortal::serving(&[DATA_PAGE]);

        portal
            .fetch_via(
                &fake,
                &QuerySpec {
                    period: query::Period::Year,
                    year: Some(2023),
                    ..QuerySpec::default()
                },
            )
            .unwrap();

        let requests = fake.requests.borrow();
        match &requests[0] {
            Request::Get { query, .. } => {
                assert!(query.contains(&("year".to_string(), "2023".to_string())));
                assert!(!query.iter().any(|(k, _)| k == "date" || k == "granularity"));
            }
            other => panic!("expected a GET, got {:?}", other),
        }
    }
}
