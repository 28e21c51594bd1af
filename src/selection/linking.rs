//! 关联网络发现
//!
//! 两个 PSK 网络如果共用同一个网关，或者接入点来自同一台设备（BSSID 前 5 字节相同），
//! 就视为同一个物理网络的不同 SSID。关联网络之间切换按漫游处理，并共享当前网络加分。

use crate::core::traits::ProfileStore;
use crate::core::types::{NetworkProfile, ProfileId, SecurityType};
use crate::selection::cache::ObservationCache;

fn linkable(profile: &NetworkProfile) -> bool {
    profile.security == SecurityType::Psk && !profile.ephemeral
}

fn should_link(
    a: &NetworkProfile,
    b: &NetworkProfile,
    cache: &ObservationCache,
    max_cached_bssids: usize,
) -> bool {
    if let (Some(gw_a), Some(gw_b)) = (a.default_gateway, b.default_gateway) {
        return gw_a == gw_b;
    }

    // 网关未知时退回到 BSSID 前缀比较；接入点太多的网络（企业网）不参与
    let (len_a, len_b) = (cache.len(a.id), cache.len(b.id));
    if len_a == 0 || len_b == 0 || len_a > max_cached_bssids || len_b > max_cached_bssids {
        return false;
    }
    let bssids_b = cache.bssids(b.id);
    cache
        .bssids(a.id)
        .iter()
        .any(|x| bssids_b.iter().any(|y| x.shares_prefix_with(y)))
}

/// 重新计算 `profile` 与其他已保存网络的关联关系，返回变化的数量
pub fn update_links(
    store: &dyn ProfileStore,
    cache: &ObservationCache,
    profile: ProfileId,
    max_cached_bssids: usize,
) -> usize {
    let Some(current) = store.profile(profile) else {
        return 0;
    };
    if !linkable(&current) {
        return 0;
    }

    let mut changes = 0;
    for other in store.saved_profiles() {
        if other.id == current.id || !linkable(&other) {
            continue;
        }
        let linked = current.is_linked(other.id);
        if should_link(&current, &other, cache, max_cached_bssids) {
            if !linked {
                log::info!(
                    "Linking profile {} ('{}') with {} ('{}')",
                    current.id,
                    current.ssid,
                    other.id,
                    other.ssid
                );
                store.link_profiles(current.id, other.id);
                changes += 1;
            }
        } else if linked {
            log::info!("Unlinking profile {} from {}", current.id, other.id);
            store.unlink_profiles(current.id, other.id);
            changes += 1;
        }
    }
    changes
}
