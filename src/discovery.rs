//! Binary-tree discovery of the 48-bit uid space.
//!
//! The descent is driven by an explicit branch stack whose depth is bounded
//! by the tree height, so it runs in constant memory no matter how many
//! responders share the bus.

use crate::consts::{DISCOVERY_ATTEMPTS, DISCOVERY_STACK_DEPTH, MAX_DEVICE_UID};
use crate::dmx_controller::{DiscoveryOption, DmxController, RdmResponseError};
use crate::dmx_uart_driver::{DmxOneShotTimer, DmxUartBus};
use crate::rdm_types::DiscoveryMuteResponse;
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};
use log::{debug, trace, warn};

#[derive(Debug, Copy, Clone)]
pub struct DiscoveryConfig {
    /// Mute-and-requery a lone responder instead of bisecting all the way
    /// down to its address. Disabled in debug builds so the full descent
    /// stays exercised.
    pub quick_find: bool,
    /// How often an unanswered branch request or mute is repeated.
    pub attempts: u8,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            quick_find: !cfg!(debug_assertions),
            attempts: DISCOVERY_ATTEMPTS,
        }
    }
}

/// Called once per discovered device with the uid, the running index and the
/// mute parameters the device answered with.
pub type DiscoveryCallback<'a> = &'a mut dyn FnMut(UniqueIdentifier, usize, &DiscoveryMuteResponse);

/// Blocking discovery that fills a caller-provided array.
///
/// All responders are unmuted first, then found and muted one by one. The
/// returned value is the total amount of devices found; recording stops at
/// the array capacity but discovery continues, so a full array means another
/// pass with more space is worthwhile.
pub fn run_full_discovery<B: DmxUartBus, T: DmxOneShotTimer>(
    controller: &mut DmxController<B, T>,
    uid_array: &mut [UniqueIdentifier],
) -> Result<usize, RdmResponseError<B::DriverError>> {
    discover_devices(
        controller,
        &DiscoveryConfig::default(),
        &mut |uid, index, _mute_response| {
            if let Some(slot) = uid_array.get_mut(index) {
                *slot = uid;
            }
        },
    )
}

/// Blocking discovery reporting every device through a callback.
pub fn discover_devices<B: DmxUartBus, T: DmxOneShotTimer>(
    controller: &mut DmxController<B, T>,
    config: &DiscoveryConfig,
    callback: DiscoveryCallback,
) -> Result<usize, RdmResponseError<B::DriverError>> {
    // un-mute everything so previously muted responders take part again
    controller.rdm_disc_un_mute(PackageAddress::Broadcast)?;

    let mut stack: heapless::Vec<(u64, u64), DISCOVERY_STACK_DEPTH> = heapless::Vec::new();
    stack.push((0, MAX_DEVICE_UID)).unwrap();

    let mut found = 0usize;

    while let Some((lower_bound, upper_bound)) = stack.pop() {
        if lower_bound == upper_bound {
            mute_singleton(controller, config, lower_bound, &mut found, callback)?;
            continue;
        }

        match query_branch(controller, config, lower_bound, upper_bound)? {
            DiscoveryOption::NoDevice => {},
            DiscoveryOption::Found(uid) if config.quick_find => {
                if quick_find(controller, config, (lower_bound, upper_bound), uid, &mut found, callback)? {
                    bisect(&mut stack, lower_bound, upper_bound);
                }
            },
            DiscoveryOption::Found(_) | DiscoveryOption::Collision => {
                bisect(&mut stack, lower_bound, upper_bound);
            },
        }
    }

    debug!("discovery finished with {} devices", found);
    Ok(found)
}

fn bisect(stack: &mut heapless::Vec<(u64, u64), DISCOVERY_STACK_DEPTH>, lower: u64, upper: u64) {
    let mid = lower + (upper - lower) / 2;

    // lower half on top so devices surface in ascending uid order
    if stack.push((mid + 1, upper)).is_err() || stack.push((lower, mid)).is_err() {
        // unreachable: the stack depth equals the tree height
        warn!("discovery branch stack exhausted");
    }
}

/// Broadcasts a branch request, repeating unanswered requests.
fn query_branch<B: DmxUartBus, T: DmxOneShotTimer>(
    controller: &mut DmxController<B, T>,
    config: &DiscoveryConfig,
    lower_bound: u64,
    upper_bound: u64,
) -> Result<DiscoveryOption, RdmResponseError<B::DriverError>> {
    let mut attempts = 0;
    loop {
        match controller.rdm_discover(lower_bound, upper_bound)? {
            DiscoveryOption::NoDevice => {
                attempts += 1;
                if attempts >= config.attempts {
                    trace!("branch {:012X}..{:012X} is silent", lower_bound, upper_bound);
                    return Ok(DiscoveryOption::NoDevice);
                }
            },
            option => return Ok(option),
        }
    }
}

/// Repeats a mute until the device answers, returning None when it stays
/// silent.
fn try_mute<B: DmxUartBus, T: DmxOneShotTimer>(
    controller: &mut DmxController<B, T>,
    attempts: u8,
    uid: UniqueIdentifier,
) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<B::DriverError>> {
    for _ in 0..attempts {
        match controller.rdm_disc_mute(PackageAddress::Device(uid)) {
            Ok(response) => return Ok(response),
            Err(RdmResponseError::NoResponse)
            | Err(RdmResponseError::NotMatching)
            | Err(RdmResponseError::ParameterDataNotDeserializable) => {},
            Err(error) => return Err(error),
        }
    }

    Ok(None)
}

fn record(
    uid: UniqueIdentifier,
    mute_response: &DiscoveryMuteResponse,
    found: &mut usize,
    callback: &mut dyn FnMut(UniqueIdentifier, usize, &DiscoveryMuteResponse),
) {
    // a multi-port device reports its binding uid; prefer that over the port
    let reported = mute_response.binding_uid.unwrap_or(uid);
    callback(reported, *found, mute_response);
    *found += 1;
}

/// A branch that cannot be split further: mute whatever lives there.
fn mute_singleton<B: DmxUartBus, T: DmxOneShotTimer>(
    controller: &mut DmxController<B, T>,
    config: &DiscoveryConfig,
    raw_uid: u64,
    found: &mut usize,
    callback: DiscoveryCallback,
) -> Result<(), RdmResponseError<B::DriverError>> {
    let uid = match UniqueIdentifier::try_from(raw_uid) {
        Ok(uid) => uid,
        // the null uid and broadcast uids address no device
        Err(_) => return Ok(()),
    };

    if let Some(mute_response) = try_mute(controller, config.attempts, uid)? {
        record(uid, &mute_response, found, callback);
        return Ok(());
    }

    // workaround for responders that byte-swap their own uid; one shot only
    if let Some(swapped) = uid.byte_swapped() {
        debug!("uid {} stays silent, trying byte-swapped {}", uid, swapped);
        if let Some(mute_response) = try_mute(controller, 1, swapped)? {
            record(swapped, &mute_response, found, callback);
        }
    }

    Ok(())
}

/// A lone responder answered a branch request: mute it and requery the same
/// branch until it is silent. Returns true if a collision showed up and the
/// branch still has to be bisected.
fn quick_find<B: DmxUartBus, T: DmxOneShotTimer>(
    controller: &mut DmxController<B, T>,
    config: &DiscoveryConfig,
    branch: (u64, u64),
    first_uid: UniqueIdentifier,
    found: &mut usize,
    callback: DiscoveryCallback,
) -> Result<bool, RdmResponseError<B::DriverError>> {
    let mut uid = first_uid;

    loop {
        if let Some(mute_response) = try_mute(controller, config.attempts, uid)? {
            record(uid, &mute_response, found, callback);
        }

        match query_branch(controller, config, branch.0, branch.1)? {
            DiscoveryOption::NoDevice => return Ok(false),
            DiscoveryOption::Found(next_uid) => uid = next_uid,
            DiscoveryOption::Collision => return Ok(true),
        }
    }
}
