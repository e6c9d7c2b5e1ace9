//! Bevy plugins necessary for the crate to function.

use std::sync::Arc;

use bevy::prelude::*;

use crate::{
    registry::TypeRegistry,
    scene::register_scene_types,
    settings::Settings,
};

/// The app-wide registry of persistent types.
///
/// Filled while the app is being built, through
/// [`AppPersistExt::register_persistent`](crate::AppPersistExt::register_persistent),
/// and read-only afterwards.
#[derive(Resource, Clone, Debug, Default, Deref)]
pub struct SceneTypes(pub Arc<TypeRegistry>);

impl SceneTypes {
    /// Mutable access to the registry, cloning it first if it is shared.
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        Arc::make_mut(&mut self.0)
    }
}

/// `bevy_persist` core functionality: [`Settings`], [`SceneTypes`] and the
/// built-in scene types.
pub struct PersistPlugin;

impl Plugin for PersistPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Settings>();

        let mut types = app.world_mut().get_resource_or_init::<SceneTypes>();

        if let Err(e) = register_scene_types(types.registry_mut()) {
            warn!("Failed to register built-in scene types: {}", e);
        }
    }
}
