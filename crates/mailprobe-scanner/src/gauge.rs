//! The reputation scoring page.
//!
//! [`ReputationGauge`] is the page as the orchestrator sees it: submit an
//! address, then read the meter until it settles. [`BrowserGauge`] drives
//! the real page through a [`SessionFactory`].

use crate::error::{Result, ScanError};
use crate::retry::sleep_or_cancel;
use mailprobe_browser::{BrowserActions, BrowserError, ElementHandle, SessionFactory};
use mailprobe_core::{ProbeTarget, ReputationConfig, Score};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const FORM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One read of the score meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeReading {
    /// The page reported it cannot score this address
    Unable,
    /// The meter shows a value (zero means "not computed yet")
    Value(Score),
    /// Nothing readable yet
    Pending,
}

#[async_trait::async_trait]
pub trait ReputationGauge: Send {
    /// Load the page and submit `target`.
    async fn submit(&mut self, target: &ProbeTarget) -> Result<()>;

    /// Read the meter once.
    async fn read(&mut self) -> Result<GaugeReading>;

    /// Reload the page.
    async fn refresh(&mut self) -> Result<()>;

    /// Discard the session; the next submit starts a fresh one.
    async fn recreate(&mut self) -> Result<()>;

    /// Shut down.
    async fn close(&mut self) -> Result<()>;
}

/// Browser-backed gauge.
pub struct BrowserGauge<F: SessionFactory> {
    factory: Arc<F>,
    session: Option<F::Session>,
    settings: ReputationConfig,
    cancel: CancellationToken,
}

impl<F: SessionFactory> BrowserGauge<F> {
    pub fn new(factory: Arc<F>, settings: ReputationConfig, cancel: CancellationToken) -> Self {
        Self {
            factory,
            session: None,
            settings,
            cancel,
        }
    }

    async fn ensure_session(&mut self) -> Result<()> {
        if self.session.is_none() {
            debug!("starting reputation browser session");
            self.session = Some(self.factory.create().await?);
        }
        Ok(())
    }

    fn session_ref(&self) -> Result<&F::Session> {
        self.session
            .as_ref()
            .ok_or(ScanError::Browser(BrowserError::SessionClosed))
    }

    /// Poll until the input and submit button are both displayed.
    async fn wait_for_form(
        &self,
        session: &F::Session,
    ) -> Result<(
        <F::Session as BrowserActions>::Element,
        <F::Session as BrowserActions>::Element,
    )> {
        let deadline = Instant::now() + Duration::from_secs(self.settings.wait_secs);
        loop {
            let input = displayed(session, &self.settings.input_selector).await;
            let submit = displayed(session, &self.settings.submit_selector).await;
            if let (Some(input), Some(submit)) = (input, submit) {
                return Ok((input, submit));
            }
            if Instant::now() >= deadline {
                return Err(ScanError::Timeout(
                    "reputation form did not become ready".to_string(),
                ));
            }
            sleep_or_cancel(FORM_POLL_INTERVAL, &self.cancel).await?;
        }
    }
}

async fn displayed<S: BrowserActions>(session: &S, selector: &str) -> Option<S::Element> {
    let element = session.find_element(selector).await.ok().flatten()?;
    element
        .is_displayed()
        .await
        .unwrap_or(false)
        .then_some(element)
}

#[async_trait::async_trait]
impl<F: SessionFactory> ReputationGauge for BrowserGauge<F> {
    async fn submit(&mut self, target: &ProbeTarget) -> Result<()> {
        self.ensure_session().await?;
        let session = self.session_ref()?;
        session.navigate(&self.settings.url).await?;

        let (input, submit) = self.wait_for_form(session).await?;
        input.clear().await?;
        input.send_keys(target.as_str()).await?;
        submit.click().await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<GaugeReading> {
        let session = self.session_ref()?;

        let source = session.page_source().await?.to_lowercase();
        if !self.settings.unable_phrases.is_empty()
            && self
                .settings
                .unable_phrases
                .iter()
                .all(|p| source.contains(&p.to_lowercase()))
        {
            return Ok(GaugeReading::Unable);
        }

        let Some(meter) = session.find_element(&self.settings.meter_selector).await? else {
            return Ok(GaugeReading::Pending);
        };
        let raw = meter.attribute(&self.settings.meter_attribute).await?;
        Ok(parse_meter(raw.as_deref()))
    }

    async fn refresh(&mut self) -> Result<()> {
        self.session_ref()?.refresh().await?;
        Ok(())
    }

    async fn recreate(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            debug!("recreating reputation browser session");
            if let Err(e) = session.quit().await {
                warn!("failed to quit reputation session: {}", e);
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.recreate().await
    }
}

/// Parse the meter attribute. Anything that is not an integer in 0..=100
/// reads as pending.
#[must_use]
pub fn parse_meter(raw: Option<&str>) -> GaugeReading {
    raw.map(str::trim)
        .and_then(|v| v.parse::<u8>().ok())
        .and_then(|v| Score::new(v).ok())
        .map_or(GaugeReading::Pending, GaugeReading::Value)
}
