//! Runtime objects built from resolved configurations.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::error::{Error, Result};

/// A runtime object instantiated from a validated [`Configuration`].
pub trait Component: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    /// Override to expose [`RunnableComponent::run`] through a handle.
    fn as_runnable(&self) -> Option<&dyn RunnableComponent> {
        None
    }
}

/// A component the command line can run.
pub trait RunnableComponent: Component {
    fn run(&self) -> Result<()>;
}

/// Builds a component from its resolved configuration.
pub type ComponentFactory =
    Arc<dyn Fn(&Configuration) -> Result<Arc<dyn Component>> + Send + Sync>;

/// Shared handle to a built component. Handles compare by identity.
#[derive(Clone)]
pub struct ComponentHandle(Arc<dyn Component>);

impl ComponentHandle {
    pub fn new(component: Arc<dyn Component>) -> Self {
        Self(component)
    }

    pub fn get(&self) -> &dyn Component {
        self.0.as_ref()
    }

    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn as_runnable(&self) -> Option<&dyn RunnableComponent> {
        self.0.as_runnable()
    }

    /// Run the component.
    ///
    /// # Errors
    ///
    /// Returns `Error::Component` if the component is not runnable, or
    /// whatever the component itself reports.
    pub fn run(&self) -> Result<()> {
        match self.as_runnable() {
            Some(runnable) => runnable.run(),
            None => Err(Error::component(format!("{:?} is not runnable", self.0))),
        }
    }
}

impl From<Arc<dyn Component>> for ComponentHandle {
    fn from(component: Arc<dyn Component>) -> Self {
        Self(component)
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
