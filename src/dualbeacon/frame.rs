use crate::time::SimTime;
use std::fmt::Display;

/// The kinds of frames exchanged between the mobile sink and the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// A short-range beacon, only audible within the communication range.
    ShortBeacon,
    /// A long-range beacon, audible within the discovery range.
    LongBeacon,
    /// A data packet from the sensor.
    Data,
    /// The acknowledgment of a data packet.
    Ack,
}

/// The two ends of the wireless link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Sensor,
    MobileSink,
}

impl FrameKind {
    /// Where a frame of this kind is headed.
    #[must_use]
    pub fn destination(self) -> Endpoint {
        match self {
            Self::ShortBeacon | Self::LongBeacon | Self::Ack => Endpoint::Sensor,
            Self::Data => Endpoint::MobileSink,
        }
    }
}

impl Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ShortBeacon => "SRB",
            Self::LongBeacon => "LRB",
            Self::Data => "DATA",
            Self::Ack => "ACK",
        };
        f.write_str(name)
    }
}

/// An immutable frame in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub created: SimTime,
}

impl Frame {
    /// Creates a frame stamped with the current simulation time.
    #[must_use]
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            created: SimTime::now(),
        }
    }
}

/// A frame that passed the channel and reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameArrival {
    pub frame: Frame,
}
