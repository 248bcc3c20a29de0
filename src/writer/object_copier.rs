//! Copy objects from one document into the incremental update of another.
//!
//! Everything reachable from a starting value is copied once, under fresh
//! object numbers in the target, and references are rewritten to match.
//! `/Parent` links are not followed, otherwise copying a page resource
//! would drag the whole page tree along.

use super::object_serializer::ObjectSerializer;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::Value;
use std::collections::HashMap;

/// Copies object graphs between documents.
pub struct ObjectCopier<'s> {
    source: &'s PdfDocument,
    renumber: HashMap<u32, u32>,
}

impl<'s> ObjectCopier<'s> {
    /// Create a copier reading from `source`.
    pub fn new(source: &'s PdfDocument) -> Self {
        Self {
            source,
            renumber: HashMap::new(),
        }
    }

    /// New number of a source object, if it has been copied.
    pub fn remap(&self, number: u32) -> Option<u32> {
        self.renumber.get(&number).copied()
    }

    /// Serializer that rewrites references to copied objects.
    pub fn serializer(&self) -> ObjectSerializer {
        ObjectSerializer::new()
            .with_renumbering(self.renumber.clone())
            .skip_key("Parent")
    }

    /// Copy every object reachable from `value` into `target`.
    ///
    /// Objects already copied by this copier are reused. New objects are
    /// appended to `target` and recorded in its cross-reference table.
    pub fn copy_reachable(&mut self, target: &mut PdfDocument, value: &Value) -> Result<()> {
        let mut pending = Vec::new();
        self.collect(value, &mut pending, 0)?;

        for &number in &pending {
            let new_number = target.create_object();
            self.renumber.insert(number, new_number);
        }

        let serializer = self.serializer();
        for number in pending {
            let object = self
                .source
                .lookup_object(number)
                .ok_or(Error::ObjectNotFound(number))?;
            let new_number = self.renumber.get(&number).copied().ok_or(Error::ObjectNotFound(number))?;
            let value = self.source.object_value(object)?;

            target.update_object(new_number);
            let bytes = match (object.stream(), value) {
                (Some(_), Value::Dictionary(dict)) => {
                    serializer.serialize_stream(new_number, 0, dict, self.source.stream_data(object)?)
                },
                _ => serializer.serialize_indirect(new_number, 0, value),
            };
            log::debug!("Copied object {} as {}", number, new_number);
            target.append(&bytes);
        }
        Ok(())
    }

    /// Depth-first collection of referenced object numbers not yet copied.
    fn collect(&self, value: &Value, pending: &mut Vec<u32>, depth: usize) -> Result<()> {
        let limit = self.source.config().parser.max_nesting;
        if depth > limit {
            return Err(Error::RecursionLimitExceeded(limit));
        }

        match value {
            Value::Reference(reference) => {
                if self.renumber.contains_key(&reference.id) || pending.contains(&reference.id) {
                    return Ok(());
                }
                let object = self
                    .source
                    .lookup_object(reference.id)
                    .ok_or(Error::ObjectNotFound(reference.id))?;
                pending.push(reference.id);
                let body = self.source.object_value(object)?;
                self.collect(body, pending, depth + 1)?;
            },
            Value::Array(array) => {
                for item in array.items() {
                    self.collect(item, pending, depth + 1)?;
                }
            },
            Value::Dictionary(dict) => {
                for (key, item) in dict.iter() {
                    if key != "Parent" {
                        self.collect(item, pending, depth + 1)?;
                    }
                }
            },
            _ => {},
        }
        Ok(())
    }
}
