use anyhow::Context;

mod secret;
pub use secret::Secret;

fn redact(s: &str) -> impl std::fmt::Debug {
    struct NoDebug(String);
    impl std::fmt::Debug for NoDebug {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    NoDebug(format!("{{len = {}}}", s.len()))
}

pub type Assign<T> = fn(&mut T, String) -> anyhow::Result<()>;

/// Overlays whichever of `keys` are set onto `this`, leaving the rest alone.
pub fn overlay_from_env<T: std::fmt::Debug>(mut this: T, keys: &[(&str, Assign<T>)]) -> anyhow::Result<T> {
    log::trace!("overlaying env vars for: {}", std::any::type_name::<T>());

    for (key, func) in keys {
        let Ok(value) = std::env::var(key) else {
            continue;
        };
        log::trace!("found {key}");
        func(&mut this, value).with_context(|| anyhow::anyhow!("invalid value for '{key}'"))?;
    }

    log::debug!("created: {:?}", this);
    Ok(this)
}

pub trait LoadFromEnv
where
    Self: Sized,
{
    fn load_from_env() -> anyhow::Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Thing {
        name: String,
        count: usize,
    }

    #[test]
    fn optional_keys() {
        std::env::set_var("TMI_CONFIG_TEST_OVERLAY_COUNT", "7");
        std::env::set_var("TMI_CONFIG_TEST_OVERLAY_BAD", "seven");

        let keys: [(&str, Assign<Thing>); 2] = [
            ("TMI_CONFIG_TEST_OVERLAY_NAME", |t, v| Ok(t.name = v)),
            ("TMI_CONFIG_TEST_OVERLAY_COUNT", |t, v| Ok(t.count = v.parse()?)),
        ];
        let base = Thing {
            name: "default".into(),
            count: 1,
        };
        let thing = overlay_from_env(base, &keys).unwrap();
        assert_eq!(thing.name, "default");
        assert_eq!(thing.count, 7);

        let keys: [(&str, Assign<Thing>); 1] = [("TMI_CONFIG_TEST_OVERLAY_BAD", |t, v| Ok(t.count = v.parse()?))];
        let err = overlay_from_env(Thing::default(), &keys);
        assert!(err.is_err());
    }
}
