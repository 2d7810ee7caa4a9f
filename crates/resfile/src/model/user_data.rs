//! Named, typed value arrays attached to records.

use std::hash::{Hash, Hasher};

use crate::model::hash_f32s;

/// Element type of a user data array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UserDataType {
    Int32 = 0,
    Single = 1,
    /// UTF-8 strings
    String = 2,
    /// UTF-16 strings
    WString = 3,
    Byte = 4,
}

impl UserDataType {
    /// Creates a UserDataType from its wire representation.
    pub fn from_u8(v: u8) -> Option<UserDataType> {
        match v {
            0 => Some(UserDataType::Int32),
            1 => Some(UserDataType::Single),
            2 => Some(UserDataType::String),
            3 => Some(UserDataType::WString),
            4 => Some(UserDataType::Byte),
            _ => None,
        }
    }
}

/// The values of a user data entry.
#[derive(Debug, Clone, PartialEq)]
pub enum UserDataValue {
    Int32(Vec<i32>),
    Single(Vec<f32>),
    String(Vec<String>),
    WString(Vec<String>),
    Byte(Vec<u8>),
}

impl UserDataValue {
    pub fn data_type(&self) -> UserDataType {
        match self {
            UserDataValue::Int32(_) => UserDataType::Int32,
            UserDataValue::Single(_) => UserDataType::Single,
            UserDataValue::String(_) => UserDataType::String,
            UserDataValue::WString(_) => UserDataType::WString,
            UserDataValue::Byte(_) => UserDataType::Byte,
        }
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        match self {
            UserDataValue::Int32(values) => values.len(),
            UserDataValue::Single(values) => values.len(),
            UserDataValue::String(values) | UserDataValue::WString(values) => values.len(),
            UserDataValue::Byte(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Hash for UserDataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data_type().hash(state);
        match self {
            UserDataValue::Int32(values) => values.hash(state),
            UserDataValue::Single(values) => hash_f32s(values, state),
            UserDataValue::String(values) | UserDataValue::WString(values) => values.hash(state),
            UserDataValue::Byte(values) => values.hash(state),
        }
    }
}

/// A named user data entry.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct UserData {
    pub name: String,
    pub value: UserDataValue,
}

impl UserData {
    pub fn new(name: impl Into<String>, value: UserDataValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
