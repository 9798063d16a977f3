//! Chrome DevTools plumbing: finding or launching the Chrome we own, holding
//! the control channel for one invocation, and binding the agent tab.

pub mod acquire;
pub mod binder;
mod cdp_page;
mod chrome_finder;
pub mod endpoint;
mod error;
mod host_pattern;
mod launcher;
pub mod ownership;
mod profile;
mod session;

pub use acquire::{AcquiredEndpoint, LaunchPolicy, SessionAcquirer};
pub use binder::bind;
pub use cdp_page::CdpPage;
pub use chrome_finder::ChromeFinder;
pub use endpoint::{Endpoint, EndpointProbe, HttpProbe};
pub use error::{Error, Result};
pub use host_pattern::HostPattern;
pub use launcher::{BrowserLauncher, ChromeLauncher, DetachedBrowser};
pub use ownership::{OwnershipClaim, ProcessInspector, SystemInspector, check_ownership};
pub use profile::ProfileDir;
pub use session::{CdpSession, ControlChannel};
