//! Composition root
//!
//! [`EngineBuilder`] turns an [`EngineConfig`] plus the host's collaborators
//! into a running [`Engine`]:
//!
//! ```text
//! EngineConfig ─► SourceStore ─┐
//!               Preprocessor ──┼─► UnitFactory ─► SingletonExtensionRegistry ─► ExtensionResolver
//!   host compiler ─────────────┘                          │
//!                                       ServiceContainer (root) ─► ServiceScope ─► ScopedExtensionRegistry
//! ```
//!
//! The compiler is the one collaborator without a default.
//!
//! ```rust,ignore
//! let engine = EngineBuilder::new(config)
//!     .with_compiler(Arc::new(MyCompiler::default()))
//!     .with_point(&GREETER)
//!     .build()?;
//! let greeter = engine.resolve(&GREETER).await?;
//! ```

use crate::config::EngineConfig;
use crate::config::loader::validate_engine_config;
use crate::di::{ServiceCollection, ServiceContainer, ServiceScope};
use crate::preprocessor::DirectivePreprocessor;
use crate::source::FileSystemSourceStore;
use exten_application::{
    ExtensionCatalog, ExtensionPoint, ExtensionResolver, PointDescriptor, RegistryOptions,
    ScopedExtensionRegistry, SingletonExtensionRegistry, UnitFactory,
};
use exten_domain::UnitDefinition;
use exten_domain::error::{Error, Result};
use exten_domain::ports::{Preprocessor, ScriptCompiler, ServiceProvider, SourceStore};
use futures::future::FutureExt;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Builder of an [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn SourceStore>>,
    preprocessor: Option<Arc<dyn Preprocessor>>,
    compiler: Option<Arc<dyn ScriptCompiler>>,
    definitions: Vec<UnitDefinition>,
    points: Vec<Arc<PointDescriptor>>,
    services: ServiceCollection,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: None,
            preprocessor: None,
            compiler: None,
            definitions: Vec::new(),
            points: Vec::new(),
            services: ServiceCollection::new(),
        }
    }

    /// Use `store` instead of the directory named by `source.root_dir`
    pub fn with_store(mut self, store: Arc<dyn SourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `preprocessor` instead of a [`DirectivePreprocessor`] built from config
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn ScriptCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Pre-register a unit definition with the factory
    pub fn with_definition(mut self, definition: UnitDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Pre-register an extension point; its unit is defined as well
    pub fn with_point<T>(mut self, point: &ExtensionPoint<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.points.push(Arc::clone(point.descriptor()));
        self
    }

    /// Pre-register `point` and expose it to host code as an `Arc<T>` service
    pub fn with_point_as_service<T>(mut self, point: &ExtensionPoint<T>) -> Result<Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services = self.services.add_extension_as_service(point)?;
        Ok(self.with_point(point))
    }

    /// Add host services to the container
    pub fn with_services<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(ServiceCollection) -> ServiceCollection,
    {
        self.services = configure(self.services);
        self
    }

    pub fn build(self) -> Result<Engine> {
        validate_engine_config(&self.config)?;
        let compiler = self
            .compiler
            .ok_or_else(|| Error::configuration("No script compiler was provided"))?;

        let (store, watched) = match self.store {
            Some(store) => (store, None),
            None => {
                let store = Arc::new(FileSystemSourceStore::open(&self.config.source)?);
                (Arc::clone(&store) as Arc<dyn SourceStore>, Some(store))
            }
        };
        let preprocessor = self.preprocessor.unwrap_or_else(|| {
            Arc::new(DirectivePreprocessor::new(self.config.preprocessor.clone()))
                as Arc<dyn Preprocessor>
        });

        let registry_options = RegistryOptions {
            allow_only_preregistered_extensions: self
                .config
                .registry
                .allow_only_preregistered_extensions,
            points: self.points,
        };
        let mut factory_options = self.config.factory.to_options();
        factory_options.definitions.extend(self.definitions);
        factory_options
            .definitions
            .extend(registry_options.definitions());

        let factory = UnitFactory::new(
            Arc::clone(&store),
            preprocessor,
            compiler,
            factory_options,
        );
        let singleton = SingletonExtensionRegistry::new(
            Arc::clone(&factory),
            Arc::new(ExtensionCatalog::new(registry_options)),
        );
        let resolver = Arc::new(ExtensionResolver::new(Arc::clone(&singleton)));

        let scoped_parent = Arc::clone(&singleton);
        let container = self
            .services
            .add_singleton(Arc::clone(&factory))
            .add_singleton(Arc::clone(&singleton))
            .add_singleton(Arc::clone(&resolver))
            .add_scoped_with_disposer(
                move |_: &Arc<dyn ServiceProvider>| {
                    Arc::new(ScopedExtensionRegistry::new(Arc::clone(&scoped_parent)))
                },
                |registry: Arc<ScopedExtensionRegistry>| {
                    async move { registry.shutdown().await }.boxed()
                },
            )
            .build();

        info!(
            store = store.store_name(),
            points = singleton.registered().len(),
            definitions = factory.registered().len(),
            "Engine ready"
        );

        Ok(Engine {
            config: self.config,
            store,
            watched,
            factory,
            singleton,
            resolver,
            container,
        })
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("store", &self.store.as_ref().map(|s| s.store_name().to_string()))
            .field("compiler", &self.compiler.as_ref().map(|c| c.compiler_name().to_string()))
            .field("definitions", &self.definitions.len())
            .field("points", &self.points.len())
            .finish_non_exhaustive()
    }
}

/// A wired engine: unit factory, registries, resolver and root provider
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn SourceStore>,
    watched: Option<Arc<FileSystemSourceStore>>,
    factory: Arc<UnitFactory>,
    singleton: Arc<SingletonExtensionRegistry>,
    resolver: Arc<ExtensionResolver>,
    container: Arc<ServiceContainer>,
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SourceStore> {
        &self.store
    }

    pub fn factory(&self) -> &Arc<UnitFactory> {
        &self.factory
    }

    pub fn singleton(&self) -> &Arc<SingletonExtensionRegistry> {
        &self.singleton
    }

    pub fn resolver(&self) -> &Arc<ExtensionResolver> {
        &self.resolver
    }

    /// The root provider
    pub fn root(&self) -> Arc<dyn ServiceProvider> {
        Arc::clone(&self.container) as Arc<dyn ServiceProvider>
    }

    /// Open a DI scope; dispose it when the unit of work ends
    pub fn create_scope(&self) -> Arc<ServiceScope> {
        self.container.create_service_scope()
    }

    /// Resolve `point` from the root provider
    pub async fn resolve<T>(&self, point: &ExtensionPoint<T>) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolver.resolve(point, &self.root()).await
    }

    /// Stop watching sources, dispose singleton instances, then every unit
    pub async fn shutdown(&self) {
        if let Some(store) = &self.watched {
            store.unwatch();
        }
        self.singleton.shutdown().await;
        self.factory.shutdown();
        info!("Engine shut down");
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store.store_name())
            .field("factory", &self.factory)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
