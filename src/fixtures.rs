#[cfg(test)]
pub mod test {
    use std::path::Path;

    use tempfile::TempDir;

    use crate::catalog::BaseCatalog;

    /// Files of the sample catalog, relative to its root.
    pub const CATALOG_FILES: &[(&str, &str)] = &[
        ("var.yaml", "optimizer: adam\nlr: 1.0e-3\n"),
        (
            "dataset/cifar/cifar10.yaml",
            "name: cifar10\nnum_classes: 10\nsplits: [70, 20, 10]\n",
        ),
        (
            "dataset/cifar/cifar100.yaml",
            "name: cifar100\nnum_classes: 100\nsplits: [80, 10, 10]\n",
        ),
        (
            "dataset/imagenet.yaml",
            "name: imagenet\nnum_classes: 1000\nsplits: [70, 20, 10]\n",
        ),
        (
            "net/efficientnet.yaml",
            "name: efficientnet\nnum_layers: 20\nckpt_path: efficientnet.pth\nuse_skip: true\n",
        ),
        (
            "net/resnet/resnet18.yaml",
            "base: net.efficientnet\nname: resnet18\nnum_layers: 18\n",
        ),
        (
            "net/resnet/resnet101.yaml",
            "base: net.efficientnet\nname: resnet101\nnum_layers: 101\nckpt_path: resnet101.pth\n",
        ),
        ("params/default.yaml", "use_bn: true\nuse_dropout: false\n"),
        (
            "params/test.yaml",
            "base: params.default\nuse_augmentation: false\n",
        ),
        (
            "params/train.yaml",
            "base: params.default\nuse_augmentation: true\n",
        ),
    ];

    /// Write `content` to `root/rel`, creating parent directories.
    pub fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// A temp directory holding the sample catalog under `bases/`.
    pub fn catalog_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in CATALOG_FILES {
            write_file(&dir.path().join("bases"), rel, content);
        }
        dir
    }

    /// Load the sample catalog written by [`catalog_dir`].
    pub fn sample_catalog(dir: &TempDir) -> BaseCatalog {
        BaseCatalog::load(&dir.path().join("bases")).unwrap()
    }

    #[test]
    fn sample_catalog_loads() {
        let dir = catalog_dir();
        let catalog = sample_catalog(&dir);
        assert!(catalog.lookup("net.resnet.resnet18").is_ok());
        assert!(catalog.lookup("dataset.cifar.cifar100").is_ok());
    }
}
