//! Real-time scheduling helpers (Linux SCHED_FIFO / mlockall).
//!
//! Everything here is best effort: a failure is logged and the control loop
//! keeps running at normal priority.

#[cfg(target_os = "linux")]
pub fn setup_rt_once(prio: Option<i32>) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    #[inline]
    fn memlock_limit_hint() -> Option<String> {
        let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        let cur = unsafe { rlim.assume_init() }.rlim_cur;
        if cur == libc::RLIM_INFINITY {
            Some("memlock limit: unlimited".to_string())
        } else {
            Some(format!("memlock limit: {} KiB", cur / 1024))
        }
    }

    // Lock current and future pages so the loop never page-faults.
    fn try_apply_mem_lock() -> eyre::Result<()> {
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        let mut msg = format!("mlockall(current|future) failed: {err}");
        if matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
        {
            if let Some(h) = memlock_limit_hint() {
                msg.push_str(&format!("; {h}"));
            }
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        }
        Err(eyre::eyre!(msg))
    }

    // Apply SCHED_FIFO priority, clamped to the system range.
    fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        let (min, max) = unsafe {
            let min = libc::sched_get_priority_min(libc::SCHED_FIFO);
            let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
            if min < 0 || max < 0 { (1, 99) } else { (min, max) }
        };
        let prio_val = prio.unwrap_or(max).clamp(min, max);
        let param = libc::sched_param {
            sched_priority: prio_val,
        };
        let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            eyre::bail!("{err}; hint: needs CAP_SYS_NICE or root");
        }
        Ok(prio_val)
    }

    RT_ONCE.get_or_init(|| {
        match try_apply_mem_lock() {
            Ok(()) => tracing::info!("rt: memory locked (current|future)"),
            Err(err) => tracing::warn!(error = %err, "rt: memory lock not applied"),
        }
        match try_apply_fifo_priority(prio) {
            Ok(p) => tracing::info!(prio = p, "rt: SCHED_FIFO applied"),
            Err(err) => tracing::warn!(?prio, error = %err, "rt: SCHED_FIFO not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(_prio: Option<i32>) {
    tracing::warn!("rt: real-time mode is only supported on Linux; ignoring --rt");
}
