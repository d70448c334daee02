//! Content-script event loop
//!
//! Drives a [`StickySession`] from page events, service replies and the
//! session's own timers on a single-threaded executor. Service requests run
//! as local tasks and report back over a channel, so a slow service never
//! blocks page events.

use crate::config::{RetryPolicy, StickyConfig};
use crate::error::StickyError;
use crate::messages::{ExploreSheet, Location, PushMessage, Request, Response, SheetExplored};
use crate::page::{Page, Viewport};
use crate::schedule::ScrollSource;
use crate::session::StickySession;
use crate::settings::SettingsUpdate;
use crate::transport::{send_with_retry, ServiceChannel};
use fos_dom::ReadyState;
use smol::channel::{Receiver, Sender};
use smol::future;
use smol::{LocalExecutor, Timer};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Something that happened on the page
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Scroll(ScrollSource),
    Resize { width: f64, height: f64 },
    ReadyStateChange(ReadyState),
    /// `DOMContentLoaded`
    ContentLoaded,
    VisibilityChange { hidden: bool },
    Focus,
    PageShow { persisted: bool },
    /// Settings storage was written by another context
    StorageChanged,
    Message(PushMessage),
}

/// Replies from tasks talking to the service
enum Inbound {
    Settings(SettingsUpdate),
    RefreshFailed(StickyError),
    Sheet { epoch: u64, result: SheetExplored },
    SheetFailed { epoch: u64, href: String, error: StickyError },
}

enum Wake {
    Event(PageEvent),
    Inbound(Inbound),
    Timer,
    Closed,
}

pub struct ContentScript<C> {
    page: Rc<RefCell<Page>>,
    session: StickySession,
    channel: Rc<C>,
    retry: RetryPolicy,
}

impl<C: ServiceChannel + 'static> ContentScript<C> {
    pub fn new(page: Rc<RefCell<Page>>, channel: Rc<C>, config: StickyConfig) -> Self {
        let retry = config.retry.clone();
        Self { page, session: StickySession::new(config), channel, retry }
    }

    pub fn page(&self) -> &Rc<RefCell<Page>> {
        &self.page
    }

    /// Run until the event channel closes, then hand back the session.
    /// Frames other than the top-level one return at once.
    pub async fn run(mut self, events: Receiver<PageEvent>) -> StickySession {
        if !self.page.borrow().top_level {
            debug!("Not a top-level frame, staying idle");
            return self.session;
        }
        let ex = LocalExecutor::new();
        ex.run(self.event_loop(&ex, events)).await;
        self.session
    }

    async fn event_loop(&mut self, ex: &LocalExecutor<'_>, events: Receiver<PageEvent>) {
        let (tx, rx) = smol::channel::unbounded();
        let location = self.page.borrow().location();
        self.refresh_settings(ex, &tx, location, "init");

        loop {
            let deadline = self.session.next_deadline();
            let wake = future::or(
                async { events.recv().await.map_or(Wake::Closed, Wake::Event) },
                future::or(
                    async {
                        match rx.recv().await {
                            Ok(inbound) => Wake::Inbound(inbound),
                            Err(_) => future::pending().await,
                        }
                    },
                    async {
                        match deadline {
                            Some(at) => {
                                Timer::at(at).await;
                                Wake::Timer
                            }
                            None => future::pending().await,
                        }
                    },
                ),
            )
            .await;

            match wake {
                Wake::Event(event) => self.on_event(ex, &tx, event),
                Wake::Inbound(inbound) => self.on_inbound(inbound),
                Wake::Timer => {
                    let reasons = self.session.run_due(&mut self.page.borrow_mut(), Instant::now());
                    for reason in reasons {
                        let page = self.page.borrow();
                        if page.hidden {
                            debug!("Page hidden, skipping {} refresh", reason);
                            continue;
                        }
                        self.refresh_settings(ex, &tx, page.location(), reason);
                    }
                }
                Wake::Closed => break,
            }

            for request in self.session.take_delegated_fetches() {
                self.delegate_fetch(ex, &tx, request);
            }
        }
        debug!("Event channel closed");
    }

    fn on_event(&mut self, ex: &LocalExecutor<'_>, tx: &Sender<Inbound>, event: PageEvent) {
        let now = Instant::now();
        let page = &mut *self.page.borrow_mut();
        let outcome = match event {
            PageEvent::Scroll(source) => {
                self.session.on_scroll(now, source);
                Ok(())
            }
            PageEvent::Resize { width, height } => {
                page.viewport = Viewport::new(width, height);
                self.session.on_resize(now);
                Ok(())
            }
            PageEvent::ReadyStateChange(state) => {
                page.set_ready_state(state);
                let outcome = match state {
                    ReadyState::Loading => Ok(()),
                    _ => self.session.on_content_loaded(page),
                };
                self.session.on_ready_state_change(now);
                outcome
            }
            PageEvent::ContentLoaded => self.session.on_content_loaded(page),
            PageEvent::VisibilityChange { hidden } => {
                page.hidden = hidden;
                if !hidden {
                    self.refresh_settings(ex, tx, page.location(), "visibility");
                }
                Ok(())
            }
            PageEvent::Focus => {
                self.refresh_settings(ex, tx, page.location(), "focus");
                Ok(())
            }
            PageEvent::PageShow { persisted } => {
                if persisted {
                    self.refresh_settings(ex, tx, page.location(), "pageshow");
                }
                Ok(())
            }
            PageEvent::StorageChanged => {
                self.session.on_storage_change(now);
                Ok(())
            }
            PageEvent::Message(PushMessage::TemporaryShowStickies) => {
                self.session.temporarily_show(page, now);
                Ok(())
            }
            PageEvent::Message(PushMessage::SheetExplored(result)) => {
                let epoch = self.session.epoch();
                self.session.on_sheet_explored(page, epoch, result)
            }
            PageEvent::Message(PushMessage::SettingsChanged(update)) => {
                // The whitelist is matched per location, so ask again as well
                let outcome = self.session.on_new_settings(page, update);
                self.refresh_settings(ex, tx, page.location(), "settings-changed");
                outcome
            }
        };
        if let Err(e) = outcome {
            warn!("Failed to handle page event: {}", e);
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        let page = &mut *self.page.borrow_mut();
        let outcome = match inbound {
            Inbound::Settings(update) => self.session.on_new_settings(page, update),
            Inbound::RefreshFailed(e) => {
                warn!("Settings refresh failed: {}", e);
                Ok(())
            }
            Inbound::Sheet { epoch, result } => self.session.on_sheet_explored(page, epoch, result),
            Inbound::SheetFailed { epoch, href, error } => {
                self.session.on_delegated_fetch_failed(epoch, &href, &error);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            warn!("Failed to apply service reply: {}", e);
        }
    }

    fn refresh_settings(&self, ex: &LocalExecutor<'_>, tx: &Sender<Inbound>, location: Location, reason: &'static str) {
        info!("Refreshing settings ({})", reason);
        let request = Request::GetSettings { location };
        let channel = self.channel.clone();
        let retry = self.retry.clone();
        let tx = tx.clone();
        ex.spawn(async move {
            let inbound = match send_with_retry(&*channel, &request, &retry).await {
                Ok(Response::Settings(update)) => Inbound::Settings(update),
                Ok(other) => Inbound::RefreshFailed(StickyError::UnexpectedResponse {
                    request: request.name(),
                    response: other.name().to_string(),
                }),
                Err(e) => Inbound::RefreshFailed(e),
            };
            let _ = tx.send(inbound).await;
        })
        .detach();
    }

    fn delegate_fetch(&self, ex: &LocalExecutor<'_>, tx: &Sender<Inbound>, sheet: ExploreSheet) {
        let epoch = self.session.epoch();
        debug!("Delegating fetch of {}", sheet.href);
        let channel = self.channel.clone();
        let retry = self.retry.clone();
        let tx = tx.clone();
        ex.spawn(async move {
            let href = sheet.href.clone();
            let request = Request::ExploreSheet(sheet);
            let inbound = match send_with_retry(&*channel, &request, &retry).await {
                Ok(Response::SheetExplored(result)) => Inbound::Sheet { epoch, result },
                Ok(other) => Inbound::SheetFailed {
                    epoch,
                    href,
                    error: StickyError::UnexpectedResponse {
                        request: request.name(),
                        response: other.name().to_string(),
                    },
                },
                Err(error) => Inbound::SheetFailed { epoch, href, error },
            };
            let _ = tx.send(inbound).await;
        })
        .detach();
    }
}
