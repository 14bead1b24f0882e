//! Per-transfer description shared by both state machines

use crate::config::wire::MAX_NAME_LEN;
use heapless::String;

/// Transfer name (destination file name or array label)
pub type TransferName = String<MAX_NAME_LEN>;

/// Reasons a transfer cannot be described
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    /// Name is empty or longer than [`MAX_NAME_LEN`]
    InvalidName,
    /// Segment size of zero
    ZeroSegmentSize,
    /// More segments than a 16-bit segment number can count
    TooManySegments,
}

/// Number of segments needed for `total_length` bytes
pub fn segment_count(total_length: u32, segment_size: u8) -> u32 {
    if segment_size == 0 {
        return 0;
    }
    total_length.div_ceil(segment_size as u32)
}

/// Size of the final segment, a full segment when the length divides evenly
pub fn last_segment_size(total_length: u32, segment_size: u8) -> u8 {
    if segment_size == 0 {
        return 0;
    }
    match (total_length % segment_size as u32) as u8 {
        0 => segment_size,
        remainder => remainder,
    }
}

/// What is being moved and how it is cut into segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub name: TransferName,
    pub total_length: u32,
    pub content_crc: u16,
    pub segment_size: u8,
    pub segment_count: u16,
    pub last_segment_size: u8,
}

impl TransferDescriptor {
    pub fn new(
        name: &str,
        total_length: u32,
        content_crc: u16,
        segment_size: u8,
    ) -> Result<Self, DescriptorError> {
        if name.is_empty() {
            return Err(DescriptorError::InvalidName);
        }
        let mut owned = TransferName::new();
        owned.push_str(name).map_err(|_| DescriptorError::InvalidName)?;

        if segment_size == 0 {
            return Err(DescriptorError::ZeroSegmentSize);
        }
        let count = u16::try_from(segment_count(total_length, segment_size))
            .map_err(|_| DescriptorError::TooManySegments)?;

        Ok(Self {
            name: owned,
            total_length,
            content_crc,
            segment_size,
            segment_count: count,
            last_segment_size: last_segment_size(total_length, segment_size),
        })
    }

    /// Payload length of segment `segment`
    pub fn segment_len(&self, segment: u16) -> usize {
        if segment + 1 >= self.segment_count {
            self.last_segment_size as usize
        } else {
            self.segment_size as usize
        }
    }

    /// Content offset where segment `segment` starts
    pub fn segment_offset(&self, segment: u16) -> u32 {
        segment as u32 * self.segment_size as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_a_arithmetic() {
        assert_eq!(segment_count(1000, 245), 5);
        assert_eq!(last_segment_size(1000, 245), 20);
    }

    #[test]
    fn test_exact_multiple() {
        assert_eq!(segment_count(490, 245), 2);
        assert_eq!(last_segment_size(490, 245), 245);
    }

    #[test]
    fn test_segmentation_property() {
        for segment_size in [1u8, 2, 7, 64, 117, 200, 245, 255] {
            for total_length in [1u32, 2, 3, 100, 244, 245, 246, 1000, 4096, 65_537] {
                let count = segment_count(total_length, segment_size);
                let last = last_segment_size(total_length, segment_size) as u32;

                assert_eq!(count, total_length.div_ceil(segment_size as u32));
                assert_eq!(last, total_length - (count - 1) * segment_size as u32);
                assert!(last >= 1 && last <= segment_size as u32);
            }
        }
    }

    #[test]
    fn test_zero_segment_size() {
        assert_eq!(segment_count(100, 0), 0);
        assert_eq!(
            TransferDescriptor::new("a", 100, 0, 0),
            Err(DescriptorError::ZeroSegmentSize)
        );
    }

    #[test]
    fn test_descriptor_segments() {
        let descriptor = TransferDescriptor::new("photo.jpg", 1000, 0xABCD, 245).unwrap();

        assert_eq!(descriptor.name.as_str(), "photo.jpg");
        assert_eq!(descriptor.segment_count, 5);
        assert_eq!(descriptor.segment_len(0), 245);
        assert_eq!(descriptor.segment_len(3), 245);
        assert_eq!(descriptor.segment_len(4), 20);
        assert_eq!(descriptor.segment_offset(4), 980);
    }

    #[test]
    fn test_name_limits() {
        assert_eq!(
            TransferDescriptor::new("", 10, 0, 245),
            Err(DescriptorError::InvalidName)
        );

        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            TransferDescriptor::new(&long, 10, 0, 245),
            Err(DescriptorError::InvalidName)
        );

        let longest = "a".repeat(MAX_NAME_LEN);
        assert!(TransferDescriptor::new(&longest, 10, 0, 245).is_ok());
    }

    #[test]
    fn test_too_many_segments() {
        assert_eq!(
            TransferDescriptor::new("big", 65_536, 0, 1),
            Err(DescriptorError::TooManySegments)
        );
        assert!(TransferDescriptor::new("big", 65_535, 0, 1).is_ok());
    }
}
