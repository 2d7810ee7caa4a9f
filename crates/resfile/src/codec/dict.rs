//! Dictionary encoding.
//!
//! ```text
//! size: u32            8 + 8 * count
//! count: u32
//! count x { name -> string, value -> record }
//! ```

use crate::codec::data::{count_u32, ElementContext, ResData};
use crate::codec::loader::ResFileLoader;
use crate::codec::saver::ResFileSaver;
use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_DICT_SIZE;
use crate::model::ResDict;

impl<T: ResData> ResData for ResDict<T> {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        let count = count_u32(self.len(), "dict")?;
        let size = count
            .checked_mul(8)
            .and_then(|entries| entries.checked_add(8))
            .ok_or(EncodeError::LengthExceedsLimit {
                field: "dict",
                len: self.len(),
                max: (u32::MAX as usize - 8) / 8,
            })?;
        saver.write_u32(size);
        saver.write_u32(count);
        for (index, (name, value)) in self.iter().enumerate() {
            saver.save_string(name);
            saver.save_ref_indexed(value, index);
        }
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let size = loader.read_u32("dict size")? as usize;
        let count = loader.read_u32("dict count")? as usize;
        if count > MAX_DICT_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "dict",
                len: count,
                max: MAX_DICT_SIZE,
            });
        }
        if size != 8 + 8 * count {
            return Err(DecodeError::MalformedEncoding { context: "dict size" });
        }

        let mut dict = ResDict::new();
        for index in 0..count {
            let name = loader.load_string("dict key")?;
            let target = loader
                .read_offset("dict value")?
                .ok_or(DecodeError::MalformedEncoding { context: "dict value" })?;
            let value = loader.load_at::<T>(target, ElementContext::indexed(index), "dict value")?;
            dict.push(name, value);
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::loader::LoadOptions;
    use crate::model::Sampler;

    #[derive(Debug, PartialEq, Hash)]
    struct Root(ResDict<Sampler>);

    impl ResData for Root {
        fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
            saver.save_dict(&self.0);
            Ok(())
        }

        fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
            Ok(Root(loader.load_dict("samplers")?))
        }
    }

    fn encode(root: &Root) -> Vec<u8> {
        let mut saver = ResFileSaver::new();
        saver.save(root).unwrap();
        saver.into_bytes()
    }

    #[test]
    fn test_dict_roundtrip_keeps_order() {
        let root = Root(
            [
                ("_s0", Sampler { name: "_s0".into(), ..Sampler::default() }),
                ("_a0", Sampler { name: "_a0".into(), lod_bias: 0.5, ..Sampler::default() }),
            ]
            .into_iter()
            .collect(),
        );
        let bytes = encode(&root);

        let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
        let decoded = Root::load(&mut loader, ElementContext::root()).unwrap();
        assert_eq!(decoded, root);
        assert_eq!(decoded.0.keys().collect::<Vec<_>>(), vec!["_s0", "_a0"]);
    }

    #[test]
    fn test_dict_header() {
        let root = Root([("a", Sampler::default())].into_iter().collect());
        let bytes = encode(&root);

        // Root pointer at 0, dict at 4
        assert_eq!(&bytes[0..4], &4i32.to_be_bytes());
        assert_eq!(&bytes[4..8], &16u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_be_bytes());
    }

    #[test]
    fn test_empty_dict_is_null() {
        let root = Root(ResDict::new());
        let bytes = encode(&root);
        assert_eq!(bytes, vec![0, 0, 0, 0]);

        let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
        let decoded = Root::load(&mut loader, ElementContext::root()).unwrap();
        assert!(decoded.0.is_empty());
    }

    #[test]
    fn test_bad_dict_size_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4i32.to_be_bytes());
        bytes.extend_from_slice(&99u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());

        let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
        let result = Root::load(&mut loader, ElementContext::root());
        assert!(matches!(result, Err(DecodeError::MalformedEncoding { context: "dict size" })));
    }
}
