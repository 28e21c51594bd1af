//! DashMap 辅助函数

use dashmap::DashMap;
use std::hash::Hash;

/// 逐个删除条目并返回被删除的键
///
/// ```
/// use dashmap::DashMap;
/// use wlink::utils::clear_dashmap;
///
/// let map: DashMap<u32, &str> = DashMap::new();
/// map.insert(1, "a");
/// map.insert(2, "b");
///
/// let mut keys = clear_dashmap(&map);
/// keys.sort();
/// assert_eq!(keys, vec![1, 2]);
/// assert!(map.is_empty());
/// ```
pub fn clear_dashmap<K, V>(map: &DashMap<K, V>) -> Vec<K>
where
    K: Clone + Eq + Hash,
{
    let keys: Vec<_> = map.iter().map(|entry| entry.key().clone()).collect();
    for key in &keys {
        map.remove(key);
    }
    keys
}

/// 克隆满足条件的值，按键排序后返回
///
/// DashMap 的迭代顺序不确定，排序后调用方拿到的结果是稳定的。
pub fn sorted_values_where<K, V, F>(map: &DashMap<K, V>, mut predicate: F) -> Vec<V>
where
    K: Clone + Ord + Hash,
    V: Clone,
    F: FnMut(&V) -> bool,
{
    let mut pairs: Vec<(K, V)> = map
        .iter()
        .filter(|entry| predicate(entry.value()))
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs.into_iter().map(|(_, v)| v).collect()
}

/// 原地修改一个条目；键不存在时返回 `None`
pub fn modify_entry<K, V, R, F>(map: &DashMap<K, V>, key: &K, f: F) -> Option<R>
where
    K: Eq + Hash,
    F: FnOnce(&mut V) -> R,
{
    map.get_mut(key).map(|mut entry| f(entry.value_mut()))
}
