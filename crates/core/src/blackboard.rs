//! Shared variable store and live-binding parameters.
//!
//! A [`Blackboard`] maps names to typed [`BlackboardField`]s. Fields are
//! reference-counted handles: engines, tasks and [`Parameter`]s keep clones
//! and all see the same value. Removing a field from the blackboard unbinds
//! it, which notifies every subscriber exactly once; bound parameters fall
//! back to their own value at that moment.

use std::any::{Any, type_name};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{EngineError, ErrorClass};

/// Failed blackboard lookup or mutation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BlackboardError {
    #[error("blackboard field '{0}' does not exist")]
    FieldNotFound(String),

    #[error("blackboard field '{name}' holds {actual}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("blackboard field '{0}' already exists")]
    DuplicateField(String),

    /// The field was removed from its blackboard and can no longer be bound.
    #[error("blackboard field '{0}' is unbound")]
    FieldUnbound(String),
}

impl EngineError for BlackboardError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Execution
    }

    fn error_code(&self) -> &'static str {
        match self {
            BlackboardError::FieldNotFound(_) => "BLACKBOARD_FIELD_NOT_FOUND",
            BlackboardError::TypeMismatch { .. } => "BLACKBOARD_TYPE_MISMATCH",
            BlackboardError::DuplicateField(_) => "BLACKBOARD_DUPLICATE_FIELD",
            BlackboardError::FieldUnbound(_) => "BLACKBOARD_FIELD_UNBOUND",
        }
    }
}

/// Handle returned by [`BlackboardField::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type UnbindObserver = Box<dyn FnMut()>;

struct FieldInner<T> {
    name: String,
    value: RefCell<T>,
    bound: Cell<bool>,
    next_subscription: Cell<u64>,
    subscribers: RefCell<Vec<(SubscriptionId, UnbindObserver)>>,
}

/// Typed, shared blackboard value.
pub struct BlackboardField<T> {
    inner: Rc<FieldInner<T>>,
}

impl<T> Clone for BlackboardField<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> BlackboardField<T> {
    fn new(name: String, value: T) -> Self {
        Self {
            inner: Rc::new(FieldInner {
                name,
                value: RefCell::new(value),
                bound: Cell::new(true),
                next_subscription: Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// `false` once the field has been removed from its blackboard.
    pub fn is_bound(&self) -> bool {
        self.inner.bound.get()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
    }

    /// Mutates the value in place.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
    }

    /// Registers a callback fired when the field is unbound.
    pub fn subscribe(&self, observer: impl FnMut() + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.get());
        self.inner.next_subscription.set(id.0 + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .subscribers
            .borrow_mut()
            .retain(|(subscription, _)| *subscription != id);
    }

    /// Marks the field unbound and notifies subscribers. Only the first call
    /// has any effect.
    fn unbind(&self) {
        if !self.inner.bound.replace(false) {
            return;
        }
        tracing::trace!("unbinding blackboard field '{}'", self.inner.name);
        // Observers may touch the field again, so none of them runs under a borrow.
        let subscribers = std::mem::take(&mut *self.inner.subscribers.borrow_mut());
        for (_, mut observer) in subscribers {
            observer();
        }
    }

    fn same_field(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for BlackboardField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlackboardField")
            .field("name", &self.inner.name)
            .field("value", &self.inner.value.borrow())
            .field("bound", &self.inner.bound.get())
            .finish()
    }
}

/// Type-erased field stored by the blackboard.
trait AnyField {
    fn as_any(&self) -> &dyn Any;

    fn value_type(&self) -> &'static str;

    fn unbind(&self);
}

impl<T: 'static> AnyField for BlackboardField<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn unbind(&self) {
        BlackboardField::unbind(self);
    }
}

/// Name-keyed store of typed fields.
#[derive(Default)]
pub struct Blackboard {
    fields: HashMap<String, Box<dyn AnyField>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a field and returns a handle to it.
    ///
    /// # Errors
    ///
    /// `DuplicateField` if a field with this name exists, whatever its type.
    pub fn create_field<T: 'static>(
        &mut self,
        name: impl Into<String>,
        value: T,
    ) -> Result<BlackboardField<T>, BlackboardError> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(BlackboardError::DuplicateField(name));
        }
        let field = BlackboardField::new(name.clone(), value);
        self.fields.insert(name, Box::new(field.clone()));
        Ok(field)
    }

    /// Fetches a field by name.
    ///
    /// # Errors
    ///
    /// `FieldNotFound` for an unknown name, `TypeMismatch` if the field holds
    /// another type.
    pub fn field<T: 'static>(&self, name: &str) -> Result<BlackboardField<T>, BlackboardError> {
        let field = self
            .fields
            .get(name)
            .ok_or_else(|| BlackboardError::FieldNotFound(name.to_owned()))?;
        field
            .as_any()
            .downcast_ref::<BlackboardField<T>>()
            .cloned()
            .ok_or_else(|| BlackboardError::TypeMismatch {
                name: name.to_owned(),
                expected: type_name::<T>(),
                actual: field.value_type(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Removes a field and notifies everything bound to it.
    ///
    /// # Errors
    ///
    /// `FieldNotFound` for an unknown name.
    pub fn remove_field(&mut self, name: &str) -> Result<(), BlackboardError> {
        let field = self
            .fields
            .remove(name)
            .ok_or_else(|| BlackboardError::FieldNotFound(name.to_owned()))?;
        tracing::debug!("removed blackboard field '{}'", name);
        field.unbind();
        Ok(())
    }

    /// Removes every field, notifying subscribers of each.
    pub fn clear(&mut self) {
        for (_, field) in self.fields.drain() {
            field.unbind();
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Blackboard").field("fields", &names).finish()
    }
}

struct Binding<T> {
    field: BlackboardField<T>,
    subscription: SubscriptionId,
}

/// Value cell holding either its own value or a live blackboard binding.
///
/// While bound, reads and writes go to the field. When the field is removed
/// from its blackboard the binding drops itself and the parameter returns
/// its own value again.
pub struct Parameter<T> {
    value: T,
    binding: Rc<RefCell<Option<Binding<T>>>>,
}

impl<T: Clone + 'static> Parameter<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            binding: Rc::new(RefCell::new(None)),
        }
    }

    pub fn get(&self) -> T {
        match &*self.binding.borrow() {
            Some(binding) => binding.field.get(),
            None => self.value.clone(),
        }
    }

    pub fn set(&mut self, value: T) {
        match &*self.binding.borrow() {
            Some(binding) => binding.field.set(value),
            None => self.value = value,
        }
    }

    /// The parameter's own value, used whenever it is not bound.
    pub fn default_value(&self) -> &T {
        &self.value
    }

    pub fn is_bound(&self) -> bool {
        self.binding.borrow().is_some()
    }

    /// Name of the bound field, if any.
    pub fn bound_field(&self) -> Option<String> {
        self.binding
            .borrow()
            .as_ref()
            .map(|binding| binding.field.name().to_owned())
    }

    /// Binds to `field`, replacing any previous binding.
    ///
    /// # Errors
    ///
    /// `FieldUnbound` if the field was already removed from its blackboard.
    pub fn bind(&mut self, field: &BlackboardField<T>) -> Result<(), BlackboardError> {
        if !field.is_bound() {
            return Err(BlackboardError::FieldUnbound(field.name().to_owned()));
        }
        if self
            .binding
            .borrow()
            .as_ref()
            .is_some_and(|binding| binding.field.same_field(field))
        {
            return Ok(());
        }
        self.unbind();

        let weak: Weak<RefCell<Option<Binding<T>>>> = Rc::downgrade(&self.binding);
        let subscription = field.subscribe(move || {
            if let Some(binding) = weak.upgrade() {
                binding.borrow_mut().take();
            }
        });
        *self.binding.borrow_mut() = Some(Binding {
            field: field.clone(),
            subscription,
        });
        Ok(())
    }

    /// Looks up `name` on `blackboard` and binds to it.
    ///
    /// # Errors
    ///
    /// Anything [`Blackboard::field`] raises.
    pub fn bind_by_name(&mut self, blackboard: &Blackboard, name: &str) -> Result<(), BlackboardError> {
        let field = blackboard.field::<T>(name)?;
        self.bind(&field)
    }

    /// Drops the binding; the parameter keeps its own value.
    pub fn unbind(&mut self) {
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.field.unsubscribe(binding.subscription);
        }
    }
}

impl<T> Drop for Parameter<T> {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.field.unsubscribe(binding.subscription);
        }
    }
}

impl<T: Default + Clone + 'static> Default for Parameter<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> From<T> for Parameter<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Parameter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = self
            .binding
            .borrow()
            .as_ref()
            .map(|binding| binding.field.name().to_owned());
        f.debug_struct("Parameter")
            .field("value", &self.value)
            .field("bound", &bound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_typed_and_unique() {
        let mut blackboard = Blackboard::new();
        let hp = blackboard.create_field("hp", 10_i32).unwrap();

        assert_eq!(
            blackboard.create_field("hp", 1.0_f32).err(),
            Some(BlackboardError::DuplicateField("hp".into()))
        );
        assert!(matches!(
            blackboard.field::<f32>("hp"),
            Err(BlackboardError::TypeMismatch { .. })
        ));
        assert_eq!(
            blackboard.field::<i32>("mana").err(),
            Some(BlackboardError::FieldNotFound("mana".into()))
        );

        let same = blackboard.field::<i32>("hp").unwrap();
        same.set(4);
        assert_eq!(hp.get(), 4);
    }

    #[test]
    fn parameter_proxies_bound_field() {
        let mut blackboard = Blackboard::new();
        let speed = blackboard.create_field("speed", 2.0_f32).unwrap();
        let mut parameter = Parameter::new(1.0_f32);

        parameter.bind_by_name(&blackboard, "speed").unwrap();
        assert_eq!(parameter.get(), 2.0);

        parameter.set(3.0);
        assert_eq!(speed.get(), 3.0);
        assert_eq!(*parameter.default_value(), 1.0);

        parameter.unbind();
        assert_eq!(parameter.get(), 1.0);
    }

    #[test]
    fn parameter_reverts_when_field_is_removed() {
        let mut blackboard = Blackboard::new();
        let target = blackboard.create_field("target", String::from("orc")).unwrap();
        let mut parameter = Parameter::new(String::from("none"));
        parameter.bind(&target).unwrap();
        assert_eq!(parameter.get(), "orc");

        blackboard.remove_field("target").unwrap();
        assert!(!parameter.is_bound());
        assert_eq!(parameter.get(), "none");
        assert_eq!(
            parameter.bind(&target),
            Err(BlackboardError::FieldUnbound("target".into()))
        );
    }

    #[test]
    fn unbind_notifies_each_subscriber_once() {
        let mut blackboard = Blackboard::new();
        let field = blackboard.create_field("flag", true).unwrap();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        field.subscribe(move || counter.set(counter.get() + 1));
        let dropped = field.subscribe(|| unreachable!());
        field.unsubscribe(dropped);

        blackboard.remove_field("flag").unwrap();
        field.unbind();
        assert_eq!(fired.get(), 1);
        assert!(!field.is_bound());
        assert_eq!(
            blackboard.remove_field("flag"),
            Err(BlackboardError::FieldNotFound("flag".into()))
        );
    }

    #[test]
    fn dropped_parameter_unsubscribes() {
        let mut blackboard = Blackboard::new();
        let field = blackboard.create_field("n", 0_u8).unwrap();
        {
            let mut parameter = Parameter::new(1_u8);
            parameter.bind(&field).unwrap();
            assert_eq!(field.inner.subscribers.borrow().len(), 1);
        }
        assert!(field.inner.subscribers.borrow().is_empty());
    }
}
