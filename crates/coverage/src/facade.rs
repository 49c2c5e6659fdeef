//! Coverage - one JS and one CSS collector over the same session
//!
//! The two collectors share nothing. Each sits behind its own async mutex so
//! JS and CSS coverage can be started and stopped independently, even
//! concurrently, through a shared `&Coverage`.

use cdp::ProtocolSession;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::css::{CssCoverage, CssCoverageOptions};
use crate::entry::CoverageEntry;
use crate::error::Result;
use crate::js::{JsCoverage, JsCoverageOptions};

pub struct Coverage {
    js: Mutex<JsCoverage>,
    css: Mutex<CssCoverage>,
}

impl Coverage {
    pub fn new(session: Arc<dyn ProtocolSession>) -> Self {
        Self {
            js: Mutex::new(JsCoverage::new(session.clone())),
            css: Mutex::new(CssCoverage::new(session)),
        }
    }

    pub async fn start_js_coverage(&self, options: JsCoverageOptions) -> Result<()> {
        self.js.lock().await.start(options).await
    }

    pub async fn stop_js_coverage(&self) -> Result<Vec<CoverageEntry>> {
        self.js.lock().await.stop().await
    }

    pub async fn start_css_coverage(&self, options: CssCoverageOptions) -> Result<()> {
        self.css.lock().await.start(options).await
    }

    pub async fn stop_css_coverage(&self) -> Result<Vec<CoverageEntry>> {
        self.css.lock().await.stop().await
    }
}
