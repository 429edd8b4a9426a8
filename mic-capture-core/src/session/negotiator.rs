//! One-shot capability exchange between the microphone and its consumer.

use crate::models::capability::{CapabilityOffer, CapabilityRequest, NegotiatedFormat};
use crate::models::config::AcquisitionConfig;
use crate::models::error::ConfigError;
use crate::models::frame::BitDepth;
use crate::traits::frame_consumer::FrameConsumer;

/// Every acquisition mode here drives a single transducer / ADC channel.
pub const MIC_MAX_CHANNELS: u8 = 1;

/// The offer a microphone configured with `config` advertises.
///
/// Both bit depths are offered since the normalizer converts between them;
/// the sample rate is fixed by the peripheral clock.
pub fn offer_for(config: &AcquisitionConfig) -> CapabilityOffer {
    CapabilityOffer {
        max_channels: MIC_MAX_CHANNELS,
        supported_bit_depths: BitDepth::SUPPORTED.to_vec(),
        supported_sample_rates: vec![config.sample_rate],
    }
}

/// The request used when the consumer does not send one: everything offered,
/// at the capture depth if it is on offer.
pub fn full_offer_request(offer: &CapabilityOffer, preferred_depth: BitDepth) -> CapabilityRequest {
    let bit_depth = if offer.supported_bit_depths.contains(&preferred_depth) {
        Some(preferred_depth)
    } else {
        offer.supported_bit_depths.first().copied()
    };
    CapabilityRequest {
        max_channels: Some(offer.max_channels),
        bit_depth,
        sample_rate: offer.supported_sample_rates.first().copied(),
    }
}

/// Check `request` against `offer`. Narrower requests are honoured, anything
/// outside the offer is a [`ConfigError::CapabilityMismatch`].
pub fn negotiate(
    offer: &CapabilityOffer,
    request: &CapabilityRequest,
    preferred_depth: BitDepth,
) -> Result<NegotiatedFormat, ConfigError> {
    let channels = request.max_channels.unwrap_or(offer.max_channels);
    if channels == 0 || channels > offer.max_channels {
        return Err(ConfigError::CapabilityMismatch(format!(
            "requested {} channel(s), microphone offers at most {}",
            channels, offer.max_channels
        )));
    }

    let bit_depth = match request.bit_depth {
        Some(depth) if offer.supported_bit_depths.contains(&depth) => depth,
        Some(depth) => {
            return Err(ConfigError::CapabilityMismatch(format!(
                "bit depth {} is not offered",
                depth
            )))
        }
        None => full_offer_request(offer, preferred_depth)
            .bit_depth
            .ok_or_else(|| ConfigError::CapabilityMismatch("no bit depth offered".into()))?,
    };

    let sample_rate = match request.sample_rate {
        Some(rate) if offer.supported_sample_rates.contains(&rate) => rate,
        Some(rate) => {
            return Err(ConfigError::CapabilityMismatch(format!(
                "sample rate {} Hz is not offered (available: {:?})",
                rate, offer.supported_sample_rates
            )))
        }
        None => offer
            .supported_sample_rates
            .first()
            .copied()
            .ok_or_else(|| ConfigError::CapabilityMismatch("no sample rate offered".into()))?,
    };

    Ok(NegotiatedFormat {
        channels,
        bit_depth,
        sample_rate,
    })
}

/// Run the exchange with `consumer` for a microphone configured with `config`.
///
/// Consumers that return no request get the full offer, so older consumers
/// work without knowing about the exchange.
pub fn negotiate_with(
    consumer: &mut dyn FrameConsumer,
    config: &AcquisitionConfig,
) -> Result<NegotiatedFormat, ConfigError> {
    let offer = offer_for(config);
    let request = match consumer.capability_request(&offer) {
        Some(request) => request,
        None => {
            log::debug!("consumer sent no capability request, using the full offer");
            full_offer_request(&offer, config.bit_depth)
        }
    };

    let format = negotiate(&offer, &request, config.bit_depth)?;
    log::debug!(
        "negotiated {} channel(s), {}, {} Hz",
        format.channels,
        format.bit_depth,
        format.sample_rate
    );
    Ok(format)
}
