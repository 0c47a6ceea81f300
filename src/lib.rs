/// 虚拟设备 (uinput) 的创建和事件写入
pub mod event_dispatcher;

/// 数位板型号相关的报告解析, 滚轮和鼠标模拟
pub mod tablet_driver;

/// 物理设备接口 (USB)
pub mod input_devices;

/// 按键到键盘宏的映射
pub mod event_router;

/// 数位板事件的抽象层，定义事件模型
pub mod event_model;

/// 设备从发现到释放的生命周期
pub mod session;

/// 配置文件的查找和校验
pub mod config;

// 一个会话只服务一个设备, 多个数位板同时接入时只有先被扫描到的那个会被使用
// 虚拟设备的身份默认是驱动自己的, `--wacom` 时伪装成 Intuos Pro S 以便 xf86-input-wacom 接管
