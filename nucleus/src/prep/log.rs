use std::time::{Duration, Instant};

/// 各处理阶段的累计计时结构。
#[derive(Clone)]
pub struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器。初始化时会视为已经调用一次`self.start()`。
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::from_micros(0),
            since: Instant::now(),
        }
    }

    /// 开始计时。可以通过再次调用来重置，或者通过之后的`self.elapsed()`方法来统计该部分时间。
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时，并将这一区间的时间累计起来。上一次调用必须是`self.start()`，否则时间计算值无意义。
    #[inline]
    pub fn elapsed(&mut self) {
        self.consumed += self.since.elapsed();
    }

    /// 计时执行闭包`f`，并返回其结果。
    #[inline]
    pub fn measure<T, F: FnOnce() -> T>(&mut self, f: F) -> T {
        self.start();
        let ret = f();
        self.elapsed();
        ret
    }

    /// 获得总共累计下来的时间综合（以毫秒为单位）。
    #[inline]
    pub fn get_total_ms(&self) -> u64 {
        self.consumed.as_millis() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AccTimer;
    use std::time::Duration;

    #[test]
    fn test_measure_accumulates() {
        let mut t = AccTimer::new();
        let v = t.measure(|| {
            std::thread::sleep(Duration::from_millis(5));
            7
        });
        assert_eq!(v, 7);
        t.measure(|| std::thread::sleep(Duration::from_millis(5)));
        assert!(t.get_total_ms() >= 10);
    }
}
