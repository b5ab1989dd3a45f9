use std::io::{Error, ErrorKind, Result};

/// Byte counters summed over a set of network interfaces.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IoCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[cfg(target_os = "linux")]
#[path = "linux.rs"]
pub mod sys;

#[cfg(not(target_os = "linux"))]
#[path = "unsupported.rs"]
pub mod sys;

/// Sums `(name, recv, sent)` device rows. An empty `interfaces` selects every device.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn sum_devices<'a, I>(devices: I, interfaces: &[String]) -> Result<IoCounters>
where
    I: IntoIterator<Item = (&'a str, u64, u64)>,
{
    let mut counters = IoCounters::default();
    let mut matched = 0;
    for (name, recv, sent) in devices {
        if !interfaces.is_empty() && !interfaces.iter().any(|i| i == name) {
            continue;
        }
        matched += 1;
        counters.bytes_recv = counters.bytes_recv.wrapping_add(recv);
        counters.bytes_sent = counters.bytes_sent.wrapping_add(sent);
    }
    if matched == 0 {
        return Err(Error::new(
            ErrorKind::NotFound,
            format!("no network interface matches {:?}", interfaces),
        ));
    }
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<(&'static str, u64, u64)> {
        vec![("lo", 10, 10), ("eth0", 1000, 200), ("wlan0", 5, 7)]
    }

    #[test]
    fn test_sum_all_devices() {
        let counters = sum_devices(devices(), &[]).unwrap();
        assert_eq!(counters.bytes_recv, 1015);
        assert_eq!(counters.bytes_sent, 217);
    }

    #[test]
    fn test_sum_selected_devices() {
        let counters = sum_devices(devices(), &["eth0".to_string()]).unwrap();
        assert_eq!(
            counters,
            IoCounters {
                bytes_sent: 200,
                bytes_recv: 1000
            }
        );
    }

    #[test]
    fn test_unknown_device() {
        let err = sum_devices(devices(), &["tun9".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
