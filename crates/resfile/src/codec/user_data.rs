//! User data encoding.
//!
//! Numeric arrays are stored as raw element data. String arrays are stored
//! as an array of string pointers; wide strings live in the string pool as
//! UTF-16.

use crate::codec::data::{count_u16, encode_payload, ElementContext, ResData};
use crate::codec::loader::ResFileLoader;
use crate::codec::saver::ResFileSaver;
use crate::codec::string_pool::StringEncoding;
use crate::error::{DecodeError, EncodeError};
use crate::model::{UserData, UserDataType, UserDataValue};

fn save_strings<'a>(saver: &mut ResFileSaver<'a>, values: &'a [String], encoding: StringEncoding) {
    if values.is_empty() {
        saver.save_null();
        return;
    }
    saver.save_custom((encoding, values.to_vec()), move |saver| {
        for value in values {
            saver.save_string_with(value, Some(encoding));
        }
        Ok(())
    });
}

fn load_strings(
    loader: &mut ResFileLoader<'_>,
    count: usize,
    encoding: StringEncoding,
) -> Result<Vec<String>, DecodeError> {
    let mut values = Vec::with_capacity(count.min(loader.len() / 4));
    for _ in 0..count {
        let value = loader
            .load_string_with(Some(encoding), "user data string")?
            .ok_or(DecodeError::MalformedEncoding { context: "user data string" })?;
        values.push(value);
    }
    Ok(values)
}

impl ResData for UserData {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        saver.save_string(&self.name);
        saver.write_u8(self.value.data_type() as u8);
        saver.write_u8(0);
        saver.write_u16(count_u16(self.value.len(), "user data count")?);

        let order = saver.byte_order();
        match &self.value {
            UserDataValue::Int32(values) => saver.save_custom_bytes(encode_payload(order, |w| {
                for value in values {
                    w.write_i32(*value);
                }
            })),
            UserDataValue::Single(values) => saver.save_custom_bytes(encode_payload(order, |w| {
                for value in values {
                    w.write_f32(*value);
                }
            })),
            UserDataValue::Byte(values) => saver.save_custom_bytes(values.clone()),
            UserDataValue::String(values) => save_strings(saver, values, StringEncoding::Utf8),
            UserDataValue::WString(values) => save_strings(saver, values, StringEncoding::Utf16),
        }
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let name = loader.load_string("user data name")?;
        let tag = loader.read_u8("user data type")?;
        let data_type = UserDataType::from_u8(tag).ok_or(DecodeError::InvalidTag {
            field: "user data type",
            value: tag as u32,
        })?;
        loader.skip(1, "user data padding")?;
        let count = loader.read_u16("user data count")? as usize;

        let value = loader.load_custom("user data values", |loader| {
            Ok(match data_type {
                UserDataType::Int32 => UserDataValue::Int32(
                    (0..count)
                        .map(|_| loader.read_i32("user data int"))
                        .collect::<Result<_, _>>()?,
                ),
                UserDataType::Single => UserDataValue::Single(
                    (0..count)
                        .map(|_| loader.read_f32("user data float"))
                        .collect::<Result<_, _>>()?,
                ),
                UserDataType::Byte => {
                    UserDataValue::Byte(loader.read_bytes(count, "user data bytes")?.to_vec())
                }
                UserDataType::String => {
                    UserDataValue::String(load_strings(loader, count, StringEncoding::Utf8)?)
                }
                UserDataType::WString => {
                    UserDataValue::WString(load_strings(loader, count, StringEncoding::Utf16)?)
                }
            })
        })?;

        let value = match value {
            Some(value) => value,
            None if count == 0 => empty_value(data_type),
            None => return Err(DecodeError::MalformedEncoding { context: "user data values" }),
        };
        Ok(UserData { name, value })
    }
}

fn empty_value(data_type: UserDataType) -> UserDataValue {
    match data_type {
        UserDataType::Int32 => UserDataValue::Int32(Vec::new()),
        UserDataType::Single => UserDataValue::Single(Vec::new()),
        UserDataType::String => UserDataValue::String(Vec::new()),
        UserDataType::WString => UserDataValue::WString(Vec::new()),
        UserDataType::Byte => UserDataValue::Byte(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::loader::LoadOptions;
    use crate::model::ResDict;

    #[derive(Debug, PartialEq, Hash)]
    struct Root(ResDict<UserData>);

    impl ResData for Root {
        fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
            saver.save_dict(&self.0);
            Ok(())
        }

        fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
            Ok(Root(loader.load_dict("user data")?))
        }
    }

    fn roundtrip(root: &Root) -> (Vec<u8>, Root) {
        let mut saver = ResFileSaver::new();
        saver.save(root).unwrap();
        let bytes = saver.into_bytes();
        let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
        let decoded = Root::load(&mut loader, ElementContext::root()).unwrap();
        (bytes, decoded)
    }

    fn entry(name: &str, value: UserDataValue) -> (String, UserData) {
        (name.to_string(), UserData::new(name, value))
    }

    #[test]
    fn test_all_types_roundtrip() {
        let root = Root(
            [
                entry("ints", UserDataValue::Int32(vec![-1, 0, 7])),
                entry("floats", UserDataValue::Single(vec![0.5, -2.0])),
                entry("bytes", UserDataValue::Byte(vec![1, 2, 3])),
                entry("tags", UserDataValue::String(vec!["metal".into(), "shiny".into()])),
                entry("wide", UserDataValue::WString(vec!["\u{30e1}\u{30bf}\u{30eb}".into()])),
                entry("none", UserDataValue::Int32(Vec::new())),
            ]
            .into_iter()
            .collect(),
        );
        let (_, decoded) = roundtrip(&root);
        assert_eq!(decoded, root);
    }

    #[test]
    fn test_wide_strings_stored_as_utf16() {
        let root = Root([entry("wide", UserDataValue::WString(vec!["ab".into()]))].into_iter().collect());
        let (bytes, _) = roundtrip(&root);
        // Length 4, then "ab" as big-endian UTF-16
        let needle = [0, 0, 0, 4, 0, b'a', 0, b'b'];
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_equal_string_arrays_share_payload() {
        let tags = UserDataValue::String(vec!["a".into(), "b".into()]);
        let root = Root([entry("x", tags.clone()), entry("y", tags)].into_iter().collect());

        let mut saver = ResFileSaver::new();
        saver.save(&root).unwrap();
        let customs = saver
            .registry()
            .entries()
            .filter(|entry| entry.kind() == crate::codec::fixup::RefKind::Custom)
            .count();
        assert_eq!(customs, 1);
    }

    #[test]
    fn test_invalid_type_rejected() {
        let data = UserData::new("x", UserDataValue::Byte(vec![1]));
        let mut saver = ResFileSaver::new();
        saver.save(&data).unwrap();
        let mut bytes = saver.into_bytes();
        bytes[4] = 5;

        let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
        assert_eq!(
            UserData::load(&mut loader, ElementContext::root()),
            Err(DecodeError::InvalidTag {
                field: "user data type",
                value: 5,
            })
        );
    }
}
