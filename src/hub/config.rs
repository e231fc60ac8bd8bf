use std::sync::Arc;

use crate::event::{ChangeEvent, DispatchPolicy};
use crate::room::LeaveNoticePolicy;
use crate::session::Identity;
use crate::websockets::ConnectHook;

/// Host-supplied behavior for one hub
#[derive(Clone, Default)]
pub struct HubConfig {
    pub(crate) policy: DispatchPolicy,
    pub(crate) leave_notices: LeaveNoticePolicy,
    pub(crate) on_connect: Option<Arc<dyn ConnectHook>>,
}

impl HubConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
    {
        self.policy = self.policy.with_filter(filter);
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(ChangeEvent) -> ChangeEvent + Send + Sync + 'static,
    {
        self.policy = self.policy.with_transform(transform);
        self
    }

    pub fn authorize<F>(mut self, collection: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Identity, &ChangeEvent) -> bool + Send + Sync + 'static,
    {
        self.policy = self.policy.authorize(collection, predicate);
        self
    }

    pub fn require_authorization(mut self) -> Self {
        self.policy = self.policy.require_authorization();
        self
    }

    pub fn with_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy = self.policy.with_collections(collections);
        self
    }

    pub fn with_leave_notices(mut self, leave_notices: LeaveNoticePolicy) -> Self {
        self.leave_notices = leave_notices;
        self
    }

    pub fn on_connect<H>(mut self, hook: H) -> Self
    where
        H: ConnectHook + 'static,
    {
        self.on_connect = Some(Arc::new(hook));
        self
    }
}
