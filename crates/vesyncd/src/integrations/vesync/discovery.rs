//! Tracking of already-exposed devices across classification passes.

use std::collections::BTreeMap;
use std::collections::HashSet;

use super::classify::Bucket;
use super::classify::ClassificationResult;
use super::device::DeviceRecord;

/// Per-bucket set of device ids that already have entities.
#[derive(Debug, Clone, Default)]
pub struct KnownDevices {
    order: BTreeMap<Bucket, Vec<String>>,
    seen: HashSet<(Bucket, String)>,
}

/// Devices that were not known before, per bucket.
#[derive(Debug, Default)]
pub struct NewDevices<'a> {
    buckets: BTreeMap<Bucket, Vec<&'a DeviceRecord>>,
}

impl<'a> NewDevices<'a> {
    pub fn get(&self, bucket: Bucket) -> &[&'a DeviceRecord] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &[&'a DeviceRecord])> {
        self.buckets
            .iter()
            .map(|(bucket, devices)| (*bucket, devices.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

impl KnownDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids known for `bucket`, in the order they were first seen.
    pub fn ids(&self, bucket: Bucket) -> &[String] {
        self.order.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, bucket: Bucket, id: &str) -> bool {
        self.seen.contains(&(bucket, id.to_string()))
    }

    /// Merge a classification into the known set and return what was new.
    ///
    /// Each bucket is diffed against its own known ids, so a device that is
    /// already a switch can still be picked up as a new sensor.
    pub fn absorb<'a>(&mut self, result: &ClassificationResult<'a>) -> NewDevices<'a> {
        let mut new = NewDevices::default();
        for (bucket, devices) in result.iter() {
            for device in devices {
                let id = device.base_unique_id();
                if self.seen.insert((bucket, id.clone())) {
                    self.order.entry(bucket).or_default().push(id);
                    new.buckets.entry(bucket).or_default().push(*device);
                }
            }
        }
        new
    }
}
