use bevy::prelude::*;

use crate::{
    plugins::SceneTypes,
    reflect::TypeDescriptor,
};

/// Extension trait that adds persistence-related methods to Bevy's [`App`].
pub trait AppPersistExt {
    /// Registers a persistent type in [`SceneTypes`].
    ///
    /// Parents must be registered before their subtypes. Failures are logged
    /// and leave the registry unchanged.
    fn register_persistent(&mut self, descriptor: impl Into<TypeDescriptor>) -> &mut Self;
}

impl AppPersistExt for App {
    fn register_persistent(&mut self, descriptor: impl Into<TypeDescriptor>) -> &mut Self {
        let mut types = self.world_mut().get_resource_or_init::<SceneTypes>();

        if let Err(e) = types.registry_mut().register(descriptor) {
            warn!("Failed to register persistent type: {}", e);
        }

        self
    }
}
