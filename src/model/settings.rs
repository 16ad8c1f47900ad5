//! model::settings — named, typed configuration groups attached to models.
//!
//! Purpose
//! -------
//! Let engines and composite builders hang their own configuration on a
//! model without the model knowing about it: MLE options, MCMC options,
//! the sub-models of a stack, and so on. Each group is a plain Rust struct;
//! the collection stores them as trait objects and hands them back by type.
//!
//! Key behaviors
//! -------------
//! - [`Settings::add`] replaces any group with the same name, so a model
//!   carries at most one group per name.
//! - [`Settings::get`] / [`Settings::get_mut`] downcast by concrete type and
//!   return `None` when the group is absent; callers fall back to
//!   `Default` rather than failing.
//! - Cloning the collection deep-copies every group through
//!   [`SettingsGroup::clone_box`].
//!
//! Conventions
//! -----------
//! - Implement the trait with [`settings_group!`](crate::settings_group),
//!   which wires `name`, `clone_box` and the `Any` accessors.
use std::{any::Any, fmt};

use crate::model::descriptor::Model;

/// A configuration block that can live in a model's [`Settings`].
pub trait SettingsGroup: Any + Send + Sync + fmt::Debug {
    /// Stable group name; one group per name per model.
    fn name(&self) -> &'static str;
    fn clone_box(&self) -> Box<dyn SettingsGroup>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implement [`SettingsGroup`] for a `Clone + Debug + Send + Sync` struct.
#[macro_export]
macro_rules! settings_group {
    ($ty:ty, $name:expr) => {
        impl $crate::model::settings::SettingsGroup for $ty {
            fn name(&self) -> &'static str {
                $name
            }
            fn clone_box(&self) -> Box<dyn $crate::model::settings::SettingsGroup> {
                Box::new(self.clone())
            }
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

/// Ordered collection of settings groups.
#[derive(Debug, Default)]
pub struct Settings {
    groups: Vec<Box<dyn SettingsGroup>>,
}

impl Clone for Settings {
    fn clone(&self) -> Self {
        Self { groups: self.groups.iter().map(|g| g.clone_box()).collect() }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Attach `group`, dropping any existing group with the same name first.
    pub fn add<T: SettingsGroup>(&mut self, group: T) {
        self.add_boxed(Box::new(group));
    }

    pub fn add_boxed(&mut self, group: Box<dyn SettingsGroup>) {
        let name = group.name();
        self.groups.retain(|g| g.name() != name);
        self.groups.push(group);
    }

    pub fn get<T: SettingsGroup>(&self) -> Option<&T> {
        self.groups.iter().find_map(|g| g.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: SettingsGroup>(&mut self) -> Option<&mut T> {
        self.groups.iter_mut().find_map(|g| g.as_any_mut().downcast_mut::<T>())
    }

    /// The attached group of type `T`, or `T::default()` when absent.
    pub fn get_or_default<T: SettingsGroup + Default + Clone>(&self) -> T {
        self.get::<T>().cloned().unwrap_or_default()
    }

    pub fn get_named(&self, name: &str) -> Option<&dyn SettingsGroup> {
        self.groups.iter().find(|g| g.name() == name).map(|g| &**g)
    }

    pub fn contains_named(&self, name: &str) -> bool {
        self.get_named(name).is_some()
    }

    /// Detach and return the group of type `T`.
    pub fn remove<T: SettingsGroup>(&mut self) -> Option<Box<dyn SettingsGroup>> {
        let idx = self.groups.iter().position(|g| g.as_any().is::<T>())?;
        Some(self.groups.remove(idx))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.groups.iter().map(|g| g.name())
    }
}

/// Copy the group of type `T` from one model to another.
///
/// Returns `false` when `from` carries no such group; `to` is then
/// unchanged.
pub fn copy_group<T: SettingsGroup>(from: &Model, to: &mut Model) -> bool {
    match from.settings.get::<T>() {
        Some(group) => {
            to.settings.add_boxed(group.clone_box());
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Alpha {
        level: u32,
    }
    crate::settings_group!(Alpha, "alpha");

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Beta {
        label: String,
    }
    crate::settings_group!(Beta, "beta");

    #[test]
    // Purpose
    // -------
    // Adding a group twice keeps one copy holding the newer values.
    //
    // Given
    // -----
    // - Two `Alpha` groups added in sequence and one `Beta`.
    //
    // Expect
    // ------
    // - Two groups in total; `Alpha` has the second level.
    fn add_replaces_same_named_group() {
        // Arrange
        let mut s = Settings::new();

        // Act
        s.add(Alpha { level: 1 });
        s.add(Beta { label: "b".into() });
        s.add(Alpha { level: 2 });

        // Assert
        assert_eq!(s.len(), 2);
        assert_eq!(s.get::<Alpha>(), Some(&Alpha { level: 2 }));
        assert!(s.contains_named("beta"));
    }

    #[test]
    // Purpose
    // -------
    // Cloned settings are isolated from the original.
    //
    // Given
    // -----
    // - A collection with an `Alpha` group, cloned, then the clone mutated.
    //
    // Expect
    // ------
    // - The original still has the old value; missing groups default.
    fn clone_is_deep() {
        // Arrange
        let mut s = Settings::new();
        s.add(Alpha { level: 7 });

        // Act
        let mut c = s.clone();
        if let Some(a) = c.get_mut::<Alpha>() {
            a.level = 99;
        }
        let removed = c.remove::<Alpha>();

        // Assert
        assert_eq!(s.get::<Alpha>().map(|a| a.level), Some(7));
        assert!(removed.is_some());
        assert!(c.get::<Alpha>().is_none());
        assert_eq!(c.get_or_default::<Beta>(), Beta::default());
    }
}
