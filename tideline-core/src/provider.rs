//! Provider - Trait abstracting resource operations
//!
//! A Provider owns the reconcilers for a family of resource types (AWS, ...)
//! and converts desired [`Resource`]s into remote API calls.

use std::future::Future;
use std::pin::Pin;

use crate::error::ReconcileResult;
use crate::resource::{Resource, State};
use crate::schema::ResourceSchema;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "db_security_group")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// All operations are async and involve side effects. Callers must serialize
/// operations on the same identity; nothing here locks across calls.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "aws")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource
    ///
    /// If identifier is provided, it is used as the identity; otherwise the
    /// identity is derived from the desired attributes.
    /// Returns `State::not_found()` if the resource does not exist.
    fn read<'a>(
        &'a self,
        resource: &'a Resource,
        identifier: Option<&'a str>,
    ) -> BoxFuture<'a, ReconcileResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the exported identity
    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ReconcileResult<State>>;

    /// Update a resource in place
    fn update<'a>(
        &'a self,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ReconcileResult<State>>;

    /// Delete a resource. Deleting an absent resource succeeds.
    fn delete<'a>(
        &'a self,
        resource: &'a Resource,
        identifier: &'a str,
    ) -> BoxFuture<'a, ReconcileResult<()>>;

    /// Schema for a resource type handled by this Provider
    fn schema_for(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.resource_types()
            .into_iter()
            .find(|t| t.name() == resource_type)
            .map(|t| t.schema())
    }
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read<'a>(
        &'a self,
        resource: &'a Resource,
        identifier: Option<&'a str>,
    ) -> BoxFuture<'a, ReconcileResult<State>> {
        (**self).read(resource, identifier)
    }

    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ReconcileResult<State>> {
        (**self).create(resource)
    }

    fn update<'a>(
        &'a self,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ReconcileResult<State>> {
        (**self).update(identifier, from, to)
    }

    fn delete<'a>(
        &'a self,
        resource: &'a Resource,
        identifier: &'a str,
    ) -> BoxFuture<'a, ReconcileResult<()>> {
        (**self).delete(resource, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;
    use crate::schema::{AttributeSchema, AttributeType};

    struct WidgetType;

    impl ResourceType for WidgetType {
        fn name(&self) -> &'static str {
            "widget"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("widget")
                .attribute(AttributeSchema::new("name", AttributeType::String).required())
        }
    }

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![Box::new(WidgetType)]
        }

        fn read<'a>(
            &'a self,
            resource: &'a Resource,
            _identifier: Option<&'a str>,
        ) -> BoxFuture<'a, ReconcileResult<State>> {
            let id = resource.id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ReconcileResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("mock-id-123")) })
        }

        fn update<'a>(
            &'a self,
            _identifier: &'a str,
            _from: &'a State,
            to: &'a Resource,
        ) -> BoxFuture<'a, ReconcileResult<State>> {
            let id = to.id.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs)) })
        }

        fn delete<'a>(
            &'a self,
            _resource: &'a Resource,
            _identifier: &'a str,
        ) -> BoxFuture<'a, ReconcileResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider = MockProvider;
        let resource = Resource::new("widget", "example");
        let state = provider.read(&resource, None).await.unwrap();
        assert!(!state.exists);
        assert_eq!(state.id, ResourceId::new("widget", "example"));
    }

    #[tokio::test]
    async fn boxed_provider_dispatches() {
        let provider: Box<dyn Provider> = Box::new(MockProvider);
        let resource = Resource::new("widget", "example");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier, Some("mock-id-123".to_string()));
    }

    #[test]
    fn schema_for_finds_registered_type() {
        let provider = MockProvider;
        assert!(provider.schema_for("widget").is_some());
        assert!(provider.schema_for("gadget").is_none());
    }
}
