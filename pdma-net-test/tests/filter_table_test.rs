// Test: filter table ordering, id allocation and callback binding

use pdma_net::api::Error;
use pdma_net::filter::{
    CallbackDesc, CallbackRegistry, DestType, FilterCallback, FilterRule, FilterTable,
    NUM_FILTER_MAX, Verdict, flags,
};
use pdma_net::packet::Packet;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Sort key of the walk order: affine rules first, by channel, then
/// everything by priority.
fn walk_key(r: &FilterRule) -> (bool, u32, u32) {
    let affine = r.has_flag(flags::MATCH_CHAN);
    (!affine, if affine { r.chan } else { 0 }, r.priority)
}

#[test]
fn test_walk_order_is_sorted() {
    let mut rng = StdRng::seed_from_u64(0x2545_f491_4f6c_dd1d);
    for round in 0..20 {
        let table = FilterTable::default();
        for _ in 0..60 {
            let mut rule = FilterRule::new().priority(rng.gen_range(0..8));
            if rng.gen_bool(0.5) {
                rule = rule.chan(rng.gen_range(0..4));
            }
            table.create(&rule).unwrap();

            if round % 2 == 1 && rng.gen_ratio(1, 4) {
                let victim = rng.gen_range(1..=60);
                let _ = table.destroy(victim);
            }
        }

        let walk: Vec<FilterRule> = table.iter().collect();
        assert!(
            walk.windows(2).all(|w| walk_key(&w[0]) <= walk_key(&w[1])),
            "round {round}: walk not sorted"
        );
    }
}

#[test]
fn test_equal_keys_keep_creation_order() {
    let table = FilterTable::default();
    let a = table.create(&FilterRule::new().priority(4)).unwrap();
    let b = table.create(&FilterRule::new().priority(4)).unwrap();
    let c = table.create(&FilterRule::new().priority(4).chan(2)).unwrap();
    let d = table.create(&FilterRule::new().priority(4).chan(2)).unwrap();
    let ids: Vec<u32> = table.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![c, d, a, b]);
}

#[test]
fn test_id_reuse_prefers_lowest() {
    let table = FilterTable::default();
    for _ in 0..10 {
        table.create(&FilterRule::new()).unwrap();
    }
    table.destroy(7).unwrap();
    table.destroy(3).unwrap();
    assert_eq!(table.create(&FilterRule::new()).unwrap(), 3);
    assert_eq!(table.create(&FilterRule::new()).unwrap(), 7);
    assert_eq!(table.create(&FilterRule::new()).unwrap(), 11);

    table.destroy_all().unwrap();
    assert!(table.is_empty());
    assert_eq!(table.create(&FilterRule::new()).unwrap(), 1);
}

#[test]
fn test_exhaustion() {
    let table = FilterTable::default();
    for id in 1..=NUM_FILTER_MAX {
        assert_eq!(table.create(&FilterRule::new()).unwrap(), id);
    }
    assert_eq!(table.create(&FilterRule::new()), Err(Error::Resource));
    assert_eq!(table.len(), NUM_FILTER_MAX as usize);
}

#[test]
fn test_enumerate_with_gaps() {
    let table = FilterTable::default();
    for p in 0..6 {
        table.create(&FilterRule::new().priority(p)).unwrap();
    }
    table.destroy(1).unwrap();
    table.destroy(4).unwrap();

    let mut seen = Vec::new();
    let mut rule = table.get_next(0).unwrap();
    loop {
        seen.push(rule.id);
        if rule.next == 0 {
            break;
        }
        rule = table.get_next(rule.next).unwrap();
    }
    assert_eq!(seen, vec![2, 3, 5, 6]);
    assert_eq!(table.get(0), Err(Error::InvalidParam));
    assert_eq!(table.get(4), Err(Error::NotFound));
}

#[test]
fn test_get_copies_rule() {
    let table = FilterTable::default();
    let rule = FilterRule::new()
        .priority(2)
        .desc("arp")
        .match_pkt(12, &[0x08, 0x06], &[])
        .to_netif(3)
        .mirror_to(0, 0)
        .user_data(99);
    let id = table.create(&rule).unwrap();

    let got = table.get(id).unwrap();
    assert_eq!(got.id, id);
    assert_eq!(got.desc, "arp");
    assert_eq!(got.matcher, rule.matcher);
    assert_eq!(got.dest, rule.dest);
    assert_eq!(got.mirror.kind, DestType::Netif);
    assert_eq!(got.user_data, 99);
    assert_eq!(got.hits, 0);
}

#[derive(Default)]
struct Hooked {
    created: Mutex<Vec<u32>>,
    destroyed: Mutex<Vec<u32>>,
}

impl FilterCallback for Hooked {
    fn filter(&self, _desc: &CallbackDesc<'_>, _pkt: Packet) -> Verdict {
        Verdict::Consumed
    }

    fn on_create(&self, rule: &FilterRule) {
        self.created.lock().push(rule.id);
    }

    fn on_destroy(&self, rule: &FilterRule) {
        self.destroyed.lock().push(rule.id);
    }
}

#[test]
fn test_callback_hooks() {
    let registry = Arc::new(CallbackRegistry::new());
    let sflow = Arc::new(Hooked::default());
    let other = Arc::new(Hooked::default());
    registry.register("sflow", sflow.clone()).unwrap();
    registry.register("other", other.clone()).unwrap();

    let table = FilterTable::new(registry);
    let a = table
        .create(&FilterRule::new().to_callback("sflow-ingress"))
        .unwrap();
    // not a callback destination: description is ignored
    table
        .create(&FilterRule::new().desc("sflow").to_netif(0))
        .unwrap();
    // no registered prefix
    let c = table.create(&FilterRule::new().to_callback("psample")).unwrap();

    assert_eq!(*sflow.created.lock(), vec![a]);
    assert!(other.created.lock().is_empty());

    table.destroy(c).unwrap();
    table.destroy(a).unwrap();
    assert_eq!(*sflow.destroyed.lock(), vec![a]);
}
