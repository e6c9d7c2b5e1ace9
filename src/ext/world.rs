use bevy::prelude::*;

use crate::{
    persister::Persister,
    plugins::SceneTypes,
    settings::Settings,
};

/// Extension trait that adds persistence-related methods to Bevy's [`World`].
pub trait WorldPersistExt {
    /// A [`Persister`] over the app's [`SceneTypes`] and [`Settings`].
    ///
    /// # Panics
    /// If [`SceneTypes`] is missing, usually because
    /// [`PersistPlugin`](crate::PersistPlugin) was not added.
    fn persister(&self) -> Persister<'_>;
}

impl WorldPersistExt for World {
    fn persister(&self) -> Persister<'_> {
        let settings = self.get_resource::<Settings>().cloned().unwrap_or_default();

        Persister::new(&self.resource::<SceneTypes>().0).with_settings(settings)
    }
}
