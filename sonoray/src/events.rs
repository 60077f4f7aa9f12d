//! Event types for Sonoray

use crate::capture::Ear;
use crate::propagation::SoundId;

/// Notifications about acoustic events, collected with
/// [`crate::AcousticEngine::poll_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum SonorayEvent {
    RaysEmitted {
        sound: SoundId,
        accepted: usize,
    },
    /// Emission did nothing, e.g. because no world is loaded
    EmissionSkipped {
        sound: SoundId,
        reason: String,
    },
    /// The ray cap turned rays away
    RaysRejected {
        sound: SoundId,
        rejected: usize,
    },
    /// The event went quiet and its impulse responses were sent for baking
    EventDispatched {
        sound: SoundId,
        impulse_responses: usize,
    },
    /// Every impulse response of the event was empty
    EventSilent {
        sound: SoundId,
    },
    EventAborted {
        sound: SoundId,
        error: String,
    },
    AudioDelivered {
        sound: SoundId,
        ear: Ear,
        samples: usize,
    },
    /// A finished buffer was dropped because the sink was not live
    DeliveryDiscarded {
        sound: SoundId,
        ear: Ear,
    },
}

impl SonorayEvent {
    pub fn sound(&self) -> &SoundId {
        match self {
            Self::RaysEmitted { sound, .. }
            | Self::EmissionSkipped { sound, .. }
            | Self::RaysRejected { sound, .. }
            | Self::EventDispatched { sound, .. }
            | Self::EventSilent { sound }
            | Self::EventAborted { sound, .. }
            | Self::AudioDelivered { sound, .. }
            | Self::DeliveryDiscarded { sound, .. } => sound,
        }
    }

    /// True for events that mean the sound will not be heard.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::EmissionSkipped { .. } | Self::EventAborted { .. } | Self::DeliveryDiscarded { .. }
        )
    }
}
